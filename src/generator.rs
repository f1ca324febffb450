use rand::seq::SliceRandom;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::Db;
use crate::gemini::{GeminiClient, GenerateError};
use crate::models::{
    group_questions, GrammarQuestion, Person, Question, QuestionGroup, SpeakingQuestion,
};
use crate::prompts;

/// Fraction of a batch that may come from the wrong pool.
const WRONG_MIX_DIVISOR: usize = 5; // floor(count * 0.2)

/// Strict parse of model output as a top-level JSON array. Anything else
/// (markdown fences, prose, an object wrapper) is a terminal parse error
/// for this call.
fn parse_array<T: DeserializeOwned>(raw: &str) -> Result<Vec<T>, GenerateError> {
    serde_json::from_str(raw.trim()).map_err(|e| {
        log::warn!("model output failed strict JSON parse: {}", e);
        GenerateError::Parse(e.to_string())
    })
}

/// Mix a bounded share of review material into a fresh batch: at most
/// `desired / 5` wrong items, drawn in randomized order without
/// replacement, alternating one wrong with one new until either source
/// runs dry, then filled from the remainder and cut to `desired`.
/// Interleaving spreads review items through the session instead of
/// front-loading them.
pub fn interleave_mix<T: Clone>(
    new_items: Vec<T>,
    wrong_pool: &[T],
    desired: usize,
    rng: &mut impl Rng,
) -> Vec<T> {
    let cap = desired / WRONG_MIX_DIVISOR;
    let mut drawn = wrong_pool.to_vec();
    drawn.shuffle(rng);
    drawn.truncate(cap);

    let mut combined = Vec::with_capacity(desired);
    let mut new_iter = new_items.into_iter();
    let mut wrong_iter = drawn.into_iter();

    loop {
        if combined.len() >= desired {
            break;
        }
        match (wrong_iter.next(), new_iter.next()) {
            (None, None) => break,
            (w, n) => {
                if let Some(w) = w {
                    combined.push(w);
                }
                if let Some(n) = n {
                    if combined.len() < desired {
                        combined.push(n);
                    }
                }
            }
        }
    }

    combined.truncate(desired);
    combined
}

// Wire shapes: the model emits group members without verb/tense (those live
// on the group), and grammar ids arrive as either strings or numbers.

#[derive(Deserialize)]
struct WireGroup {
    verb: String,
    tense: String,
    #[serde(default, rename = "englishMeaning")]
    english_meaning: String,
    #[serde(default)]
    questions: Vec<WireGroupQuestion>,
}

#[derive(Deserialize)]
struct WireGroupQuestion {
    person: Person,
    answer: String,
    #[serde(default)]
    example: Option<String>,
}

impl WireGroup {
    fn into_group(self) -> QuestionGroup {
        let questions = self
            .questions
            .into_iter()
            .map(|q| Question {
                id: 0,
                verb: self.verb.clone(),
                tense: self.tense.clone(),
                person: q.person,
                english_meaning: self.english_meaning.clone(),
                example: q.example,
                answer: q.answer,
            })
            .collect();
        QuestionGroup {
            verb: self.verb,
            tense: self.tense,
            english_meaning: self.english_meaning,
            questions,
        }
    }
}

#[derive(Deserialize)]
struct WireGrammarQuestion {
    #[serde(default)]
    id: Option<serde_json::Value>,
    sentence: String,
    answer: String,
}

impl WireGrammarQuestion {
    fn into_question(self) -> GrammarQuestion {
        let id = match self.id {
            Some(serde_json::Value::String(s)) if !s.is_empty() => s,
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => Uuid::new_v4().to_string(),
        };
        GrammarQuestion {
            id,
            sentence: self.sentence,
            answer: self.answer,
        }
    }
}

#[derive(Deserialize)]
struct WireSpeakingQuestion {
    question: String,
    answer: String,
}

/// Generate `count` conjugation groups, mixing in at most `count / 5`
/// previously-missed groups, with fresh sequential ids drawn from the
/// persisted counter.
pub async fn generate_conjugation_groups(
    client: &GeminiClient,
    db: &Db,
    count: usize,
    wrong_pool: &[Question],
    allowed_tenses: &[String],
    rng: &mut impl Rng,
) -> Result<Vec<QuestionGroup>, GenerateError> {
    let asked = db.load_conjugation_asked().await?;
    let excluded_verbs = distinct(asked.iter().map(|g| g.verb.trim().to_lowercase()));

    let prompt = prompts::conjugation_prompt(count, &excluded_verbs, allowed_tenses);
    let raw = client
        .generate(prompts::CONJUGATION_SYSTEM, &prompt, 1.0, 0.9)
        .await?;

    let wire: Vec<WireGroup> = parse_array(&raw)?;
    let mut fresh: Vec<QuestionGroup> = wire.into_iter().map(WireGroup::into_group).collect();
    let before = fresh.len();
    fresh.retain(|g| g.is_well_formed());
    if fresh.len() < before {
        log::debug!("dropped {} malformed group(s) from model output", before - fresh.len());
    }
    if fresh.is_empty() {
        return Err(GenerateError::Empty);
    }

    let wrong_groups = group_questions(wrong_pool);
    let mut batch = interleave_mix(fresh, &wrong_groups, count, rng);

    let total_questions: u64 = batch.iter().map(|g| g.questions.len() as u64).sum();
    let mut next_id = db.take_question_ids(total_questions).await?;
    for group in &mut batch {
        for q in &mut group.questions {
            q.id = next_id;
            next_id += 1;
        }
    }

    db.append_conjugation_asked(&batch).await?;
    Ok(batch)
}

/// Generate `count` fill-in-the-blank grammar questions for a theme. No
/// wrong-pool mixing in this mode; previously asked sentences are both
/// excluded in the prompt and filtered from the result.
pub async fn generate_grammar_questions(
    client: &GeminiClient,
    db: &Db,
    theme: &str,
    count: usize,
) -> Result<Vec<GrammarQuestion>, GenerateError> {
    let asked = db.load_grammar_asked().await?;

    let prompt = prompts::grammar_prompt(count, theme, &asked);
    let raw = client
        .generate(prompts::GRAMMAR_SYSTEM, &prompt, 1.0, 0.9)
        .await?;

    let wire: Vec<WireGrammarQuestion> = parse_array(&raw)?;
    let mut seen: Vec<String> = asked;
    let mut questions = Vec::new();
    for q in wire.into_iter().map(WireGrammarQuestion::into_question) {
        if seen.iter().any(|s| s == &q.sentence) {
            log::debug!("skipping already-asked sentence: {}", q.sentence);
            continue;
        }
        seen.push(q.sentence.clone());
        questions.push(q);
    }

    if questions.is_empty() {
        return Err(GenerateError::Empty);
    }

    let sentences: Vec<String> = questions.iter().map(|q| q.sentence.clone()).collect();
    db.append_grammar_asked(&sentences).await?;
    Ok(questions)
}

/// Generate speaking questions with model answers, personalized from the
/// user's self-introduction. Each survivor gets a fresh uuid and today's
/// date.
pub async fn generate_speaking_questions(
    client: &GeminiClient,
    db: &Db,
    intro: &str,
    count: usize,
) -> Result<Vec<SpeakingQuestion>, GenerateError> {
    let asked = db.load_speaking_asked().await?;

    let prompt = prompts::speaking_prompt(count, intro, &asked);
    let raw = client
        .generate(prompts::SPEAKING_SYSTEM, &prompt, 0.9, 0.95)
        .await?;

    let wire: Vec<WireSpeakingQuestion> = parse_array(&raw)?;
    let today = chrono::Local::now().format("%Y-%m-%d").to_string();

    let mut seen: Vec<String> = asked;
    let mut questions = Vec::new();
    for q in wire {
        if seen.iter().any(|s| s == &q.question) {
            continue;
        }
        seen.push(q.question.clone());
        questions.push(SpeakingQuestion {
            id: Uuid::new_v4().to_string(),
            question: q.question,
            answer: q.answer,
            date: today.clone(),
        });
    }

    if questions.is_empty() {
        return Err(GenerateError::Empty);
    }

    let texts: Vec<String> = questions.iter().map(|q| q.question.clone()).collect();
    db.append_speaking_asked(&texts).await?;
    Ok(questions)
}

fn distinct(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for v in values {
        if !out.contains(&v) {
            out.push(v);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_group;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn groups(names: &[&str]) -> Vec<QuestionGroup> {
        names.iter().map(|n| test_group(n, "présent")).collect()
    }

    #[test]
    fn mix_respects_wrong_bound_and_batch_size() {
        let fresh = groups(&["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"]);
        let wrong = groups(&["w1", "w2", "w3", "w4", "w5", "w6"]);
        let mut rng = StdRng::seed_from_u64(7);

        let mixed = interleave_mix(fresh, &wrong, 10, &mut rng);
        assert_eq!(mixed.len(), 10);
        let wrong_count = mixed.iter().filter(|g| g.verb.starts_with('w')).count();
        assert_eq!(wrong_count, 2); // floor(10 * 0.2)
    }

    #[test]
    fn mix_alternates_wrong_then_new() {
        let fresh = groups(&["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"]);
        let wrong = groups(&["w1"]);
        let mut rng = StdRng::seed_from_u64(0);

        let mixed = interleave_mix(fresh, &wrong, 10, &mut rng);
        assert!(mixed[0].verb.starts_with('w'));
        assert_eq!(mixed[1].verb, "a");
        assert_eq!(mixed.len(), 10);
    }

    #[test]
    fn mix_with_empty_wrong_pool_is_fresh_only() {
        let fresh = groups(&["a", "b", "c"]);
        let mut rng = StdRng::seed_from_u64(1);
        let mixed = interleave_mix(fresh.clone(), &[], 3, &mut rng);
        assert_eq!(mixed, fresh);
    }

    #[test]
    fn mix_truncates_oversized_fresh_pool() {
        let fresh = groups(&["a", "b", "c", "d", "e"]);
        let mut rng = StdRng::seed_from_u64(1);
        let mixed = interleave_mix(fresh, &[], 4, &mut rng);
        assert_eq!(mixed.len(), 4);
    }

    #[test]
    fn mix_is_deterministic_for_a_seed() {
        let fresh = groups(&["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"]);
        let wrong = groups(&["w1", "w2", "w3", "w4"]);

        let first = interleave_mix(fresh.clone(), &wrong, 10, &mut StdRng::seed_from_u64(42));
        let second = interleave_mix(fresh, &wrong, 10, &mut StdRng::seed_from_u64(42));
        assert_eq!(first, second);
    }

    #[test]
    fn parse_rejects_non_array_output() {
        assert!(matches!(
            parse_array::<WireGroup>(r#"{"verb": "aller"}"#),
            Err(GenerateError::Parse(_))
        ));
        assert!(matches!(
            parse_array::<WireGroup>("```json\n[]\n```"),
            Err(GenerateError::Parse(_))
        ));
        assert!(matches!(
            parse_array::<WireGroup>("Voici les questions:"),
            Err(GenerateError::Parse(_))
        ));
    }

    #[test]
    fn parse_accepts_group_array_and_builds_questions() {
        let raw = r#"[
            {
                "verb": "manger",
                "tense": "présent",
                "englishMeaning": "to eat",
                "questions": [
                    {"person": "je", "answer": "je mange"},
                    {"person": "nous", "answer": "nous mangeons"},
                    {"person": "ils", "answer": "ils mangent"}
                ]
            }
        ]"#;
        let wire: Vec<WireGroup> = parse_array(raw).unwrap();
        let group = wire.into_iter().next().unwrap().into_group();
        assert!(group.is_well_formed());
        assert!(group.questions.iter().all(|q| q.verb == "manger"));
        assert!(group.questions.iter().all(|q| q.tense == "présent"));
    }

    #[test]
    fn grammar_wire_coerces_numeric_and_missing_ids() {
        let raw = r#"[
            {"id": 3, "sentence": "Je ____ au travail.", "answer": "vais"},
            {"sentence": "Nous ____ du pain.", "answer": "achetons"}
        ]"#;
        let wire: Vec<WireGrammarQuestion> = parse_array(raw).unwrap();
        let qs: Vec<GrammarQuestion> = wire.into_iter().map(|w| w.into_question()).collect();
        assert_eq!(qs[0].id, "3");
        assert!(!qs[1].id.is_empty());
    }
}
