//! Prompt templates for image and text analysis

use crate::extract::{ExtractionMode, REPORT_CLOSE, REPORT_OPEN};

/// Heading the image report is expected to start with
pub const REPORT_MARKER: &str = "### 1.";

/// System-role instruction for image analysis
pub const IMAGE_SYSTEM_INSTRUCTION: &str = "You are a highly skilled medical imaging expert.";

/// User-role instruction for image analysis (five report sections)
pub const IMAGE_ANALYSIS_PROMPT: &str = r#"
You are a highly skilled medical imaging expert with extensive knowledge in radiology and diagnostic imaging. I will provide you with a medical image. Please analyze it and structure your response as follows:

### 1. Image Type & Region
- Identify imaging modality (X-ray/MRI/CT/Ultrasound/etc.).
- Specify anatomical region and positioning.
- Evaluate image quality and technical adequacy.

### 2. Key Findings
- Highlight primary observations systematically.
- Identify potential abnormalities with detailed descriptions.
- Include measurements and densities where relevant.

### 3. Diagnostic Assessment
- Provide primary diagnosis with confidence level.
- List differential diagnoses ranked by likelihood.
- Support each diagnosis with observed evidence.
- Highlight critical/urgent findings.

### 4. Patient-Friendly Explanation
- Simplify findings in clear, non-technical language.
- Avoid medical jargon or provide easy definitions.
- Include relatable visual analogies.

### 5. Clinical Recommendations
- Suggest appropriate follow-up studies if needed.
- Recommend consultation with specialists when relevant.
- Provide general treatment considerations.

**Important Notes:**
- This analysis is for educational/research purposes only
- Always consult qualified healthcare professionals for medical decisions
- AI analysis should supplement, not replace, professional medical judgment

Ensure a structured and medically accurate response using clear markdown formatting.
"#;

/// Build the user-role instruction for an image request
pub fn image_prompt(mode: ExtractionMode) -> String {
    match mode {
        ExtractionMode::Marker => IMAGE_ANALYSIS_PROMPT.to_string(),
        ExtractionMode::Delimited => format!(
            "{}\nWrap the complete report, from section 1 to section 5, between a line \
containing only {} and a line containing only {}. Write nothing else outside that block.\n",
            IMAGE_ANALYSIS_PROMPT, REPORT_OPEN, REPORT_CLOSE
        ),
    }
}

/// Build the text-analysis prompt with the user's text embedded verbatim
pub fn text_prompt(text_input: &str) -> String {
    format!(
        r#"
You are a medical expert analyzing a medical report or text. Please provide:

### 1. Document Analysis
- Type of medical document
- Key medical findings mentioned
- Relevant medical history

### 2. Clinical Interpretation
- Significant findings and their implications
- Potential diagnoses suggested by the text
- Areas requiring attention

### 3. Patient-Friendly Summary
- Explain findings in simple terms
- Highlight important points for patient understanding

### 4. Recommendations
- Suggested follow-up actions
- Questions to discuss with healthcare provider

**Medical Text to Analyze:**
{}

**Important:** This analysis is for educational purposes only. Always consult healthcare professionals for medical decisions.
"#,
        text_input
    )
}
