//! Prompt templates sent to the generation model. Each builder embeds the
//! exclusion list derived from the asked-history so near-term repeats are
//! avoided.

pub const CONJUGATION_SYSTEM: &str =
    "You are a helpful assistant generating French conjugation questions.";

pub const GRAMMAR_SYSTEM: &str =
    "You are a helpful assistant generating French grammar questions.";

pub const SPEAKING_SYSTEM: &str =
    "You are a French teacher helping a student prepare for the TCF Canada speaking test.";

pub fn conjugation_prompt(count: usize, excluded_verbs: &[String], allowed_tenses: &[String]) -> String {
    let excluded = if excluded_verbs.is_empty() {
        String::new()
    } else {
        format!("Avoid using these verbs: {}.", excluded_verbs.join(", "))
    };

    let tense_filter = if allowed_tenses.is_empty() {
        "Use a variety of tenses (présent, passé composé, futur simple, imparfait, \
         conditionnel, subjonctif, etc.). No more than 30% of groups should use présent tense."
            .to_string()
    } else {
        format!("Only use these tenses: {}.", allowed_tenses.join(", "))
    };

    format!(
        r#"Generate EXACTLY {count} French verb conjugation question groups as a flat JSON array.

Each group should follow this schema:
{{
  "verb": string,
  "tense": string,
  "englishMeaning": string,
  "questions": [ {{ "person": "je" | "nous" | "ils", "answer": string }} ] // exactly 3
}}

Rules:
- Each group contains questions for the same verb and tense.
- The 3 questions in each group correspond to "je", "nous", and "ils", in any order.
- No verb should repeat across groups.
- {tense_filter}
- Include 15-20% basic verbs (être, avoir, aller, faire).
- Provide accurate conjugations including subject pronouns.
- For ALL groups with tense "subjonctif", ALL answers MUST start with "que" followed by the conjugated verb phrase (e.g., "que je vaille").
- Do NOT include explanations.
- Output only the raw JSON array. Do NOT wrap the output in markdown or quotes.
- Do NOT escape quotes or other characters.
- The JSON must be valid and parsable.
{excluded}
"#
    )
}

pub fn grammar_prompt(count: usize, theme: &str, excluded_sentences: &[String]) -> String {
    let excluded = if excluded_sentences.is_empty() {
        String::new()
    } else {
        format!(
            "Avoid generating questions similar to these sentences:\n{}\n",
            excluded_sentences
                .iter()
                .map(|s| format!("- {}", s))
                .collect::<Vec<_>>()
                .join("\n")
        )
    };

    format!(
        r#"Generate EXACTLY {count} French grammar questions focused on verb conjugation.

Each question must be an object with:
{{
  "id": string,
  "sentence": string,  // A sentence with one missing conjugated verb replaced by "____", e.g. "Je ____ au travail."
  "answer": string   // The correct conjugated verb form for the blank (just the verb part, e.g. "vais")
}}

Rules:
- Use a variety of tenses and verbs.
- Questions should be practical and realistic.
- DO NOT include the subject pronoun in the answer, only the conjugated verb.
- Avoid generating duplicate or very similar sentences.
- Output only a valid JSON array of such objects, no explanations, no markdown, no quotes wrapping the JSON.
- Do NOT escape quotes or characters in the JSON.

{excluded}
Use this theme or context for the sentences:
"""
{theme}
"""
"#
    )
}

pub fn speaking_prompt(count: usize, intro: &str, asked: &[String]) -> String {
    let asked_block = if asked.is_empty() {
        String::new()
    } else {
        format!(
            "AVOID generating questions similar to these already-asked questions:\n{}\n",
            asked
                .iter()
                .map(|q| format!("- {}", q))
                .collect::<Vec<_>>()
                .join("\n")
        )
    };

    format!(
        r#"You are a French teacher preparing students for the TCF Canada speaking test.

{asked_block}

Based on the following self-introduction, generate exactly {count} **different** French speaking questions with personalized, realistic answers.

SELF-INTRODUCTION:
"""
{intro}
"""

OUTPUT:
A raw JSON array of objects like this:

[
  {{
    "question": "Pourquoi avez-vous choisi de vivre au Canada ?",
    "answer": "J'ai choisi de vivre au Canada pour découvrir une nouvelle culture et développer ma carrière."
  }}
]

Rules:
- DO NOT use markdown code blocks
- DO NOT add explanations, intros, comments, or formatting
- ONLY return valid JSON, not wrapped in quotes, not inside Markdown
- If unsure, return an empty array []
"#
    )
}
