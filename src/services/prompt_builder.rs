use crate::model::{EncodedImage, Part, PromptPayload};

pub const INSTRUCTION: &str = "I'm showing you two images of a construction or structure project. \
The first image shows the current state, and the second image shows what the completed project \
should look like according to its building information model. Based on these images, give me an \
estimated percentage of completion (just the number, e.g., '65%'). \
Then provide a detailed explanation of your reasoning.";

/// Instruction first, then the current state, then the completed target.
pub fn build_prompt(current: EncodedImage, complete: EncodedImage) -> PromptPayload {
    PromptPayload::new(vec![
        Part::Text(INSTRUCTION.to_string()),
        Part::InlineImage(current),
        Part::InlineImage(complete),
    ])
}
