//! The fixed instruction block and the per-applicant profile text.

use crush_ai::Prompt;
use crush_core::Applicant;

use crate::normalizer::NormalizedImage;

/// Persona and output contract sent with every report request.
pub const SYSTEM_PROMPT: &str = "\
You are a professional relationship and personality analyst working for a \
matchmaking service. You receive one applicant's questionnaire answers and \
their photos. Write a warm, specific and honest personality report.

Output contract:
- Reply with a JSON array and nothing else. Do not wrap it in Markdown fences.
- Each element is an object with exactly two string fields: \"title\" and \"content\".
- Number the titles in order, e.g. \"1. Personality traits\".
- \"content\" may use Markdown (paragraphs, lists, bold).
- Cover, in this order: personality traits, social style, approach to \
relationships, what they look for in a partner, career and lifestyle, \
advice for dating.
- Write every title and every piece of content in the same language the \
applicant used in their self-introduction.
- Refer to the photos only for impressions of style and mood. Never comment \
on attractiveness or body shape.";

/// Assembles the multimodal prompt for `applicant`.
///
/// Contact details are never included.
#[must_use]
pub fn build_prompt(applicant: &Applicant, images: &[NormalizedImage]) -> Prompt {
    Prompt {
        system: SYSTEM_PROMPT.to_owned(),
        text: profile_text(applicant, images.len()),
        images: images.iter().map(|img| img.data_uri.clone()).collect(),
    }
}

fn profile_text(applicant: &Applicant, image_count: usize) -> String {
    let fields = [
        ("Name", applicant.name.as_str()),
        ("Gender", applicant.gender.label()),
        ("Orientation", applicant.orientation.as_str()),
        ("Birth period", applicant.birth_date.as_str()),
        ("Zodiac sign", applicant.zodiac.as_str()),
        ("MBTI", applicant.mbti.as_str()),
        ("Location", applicant.location.as_str()),
        ("Occupation", applicant.occupation.as_str()),
        ("Self-introduction", applicant.self_intro.as_str()),
    ];

    let mut text = String::from("Applicant profile:\n");
    for (label, value) in fields {
        let value = value.trim();
        let value = if value.is_empty() { "(not provided)" } else { value };
        text.push_str(label);
        text.push_str(": ");
        text.push_str(value);
        text.push('\n');
    }
    if image_count > 0 {
        text.push_str(&format!("\n{image_count} photo(s) attached.\n"));
    }
    text
}
