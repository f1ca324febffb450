use serde::{Deserialize, Serialize};
use std::fmt;

/// The three grammatical persons every conjugation group must cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Person {
    #[serde(rename = "je")]
    Je,
    #[serde(rename = "nous")]
    Nous,
    #[serde(rename = "ils")]
    Ils,
}

impl Person {
    pub const ALL: [Person; 3] = [Person::Je, Person::Nous, Person::Ils];

    pub fn as_str(&self) -> &'static str {
        match self {
            Person::Je => "je",
            Person::Nous => "nous",
            Person::Ils => "ils",
        }
    }
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    // Session-scoped display number, reassigned on every batch build.
    // Never used for dedup; see QuestionKey.
    #[serde(default)]
    pub id: u64,
    pub verb: String,
    pub tense: String,
    pub person: Person,
    #[serde(default, rename = "englishMeaning")]
    pub english_meaning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    pub answer: String,
}

/// Stable cross-session identity of a conjugation question. The numeric id
/// is recycled whenever a batch is rebuilt, so dedup and removal key on the
/// normalized (verb, tense, person) triple instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuestionKey {
    pub verb: String,
    pub tense: String,
    pub person: Person,
}

impl Question {
    pub fn key(&self) -> QuestionKey {
        QuestionKey {
            verb: normalize(&self.verb),
            tense: normalize(&self.tense),
            person: self.person,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionGroup {
    pub verb: String,
    pub tense: String,
    #[serde(default, rename = "englishMeaning")]
    pub english_meaning: String,
    pub questions: Vec<Question>,
}

/// Identity of a group: its normalized (verb, tense) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub verb: String,
    pub tense: String,
}

impl QuestionGroup {
    pub fn group_key(&self) -> GroupKey {
        GroupKey {
            verb: normalize(&self.verb),
            tense: normalize(&self.tense),
        }
    }

    /// Exactly three questions, covering je/nous/ils exactly once each.
    pub fn is_well_formed(&self) -> bool {
        self.questions.len() == 3
            && Person::ALL
                .iter()
                .all(|p| self.questions.iter().any(|q| q.person == *p))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GrammarQuestion {
    pub id: String,
    /// Sentence containing one "____" blank for the conjugated verb.
    pub sentence: String,
    /// Bare conjugated verb, no subject pronoun.
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpeakingQuestion {
    pub id: String,
    pub question: String,
    pub answer: String,
    /// ISO-8601 calendar date, e.g. "2025-07-22".
    pub date: String,
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Trimmed, case-insensitive answer comparison. Accents must match; fuzzy
/// grading is out of scope.
pub fn answers_match(user: &str, expected: &str) -> bool {
    user.trim().to_lowercase() == expected.trim().to_lowercase()
}

/// Partition a flat question sequence into groups of three, in input order.
/// A chunk becomes a group only if it has exactly three questions covering
/// je/nous/ils; anything else (short tail, duplicated person) is dropped,
/// not repaired.
pub fn group_questions(questions: &[Question]) -> Vec<QuestionGroup> {
    let mut groups = Vec::with_capacity(questions.len() / 3);
    for chunk in questions.chunks(3) {
        let covered = chunk.len() == 3
            && Person::ALL
                .iter()
                .all(|p| chunk.iter().any(|q| q.person == *p));
        if !covered {
            log::debug!(
                "dropping malformed chunk of {} question(s) (verb {:?})",
                chunk.len(),
                chunk.first().map(|q| q.verb.as_str())
            );
            continue;
        }
        groups.push(QuestionGroup {
            verb: chunk[0].verb.clone(),
            tense: chunk[0].tense.clone(),
            english_meaning: chunk[0].english_meaning.clone(),
            questions: chunk.to_vec(),
        });
    }
    groups
}

#[cfg(test)]
pub(crate) fn test_question(verb: &str, tense: &str, person: Person, answer: &str) -> Question {
    Question {
        id: 0,
        verb: verb.to_string(),
        tense: tense.to_string(),
        person,
        english_meaning: String::new(),
        example: None,
        answer: answer.to_string(),
    }
}

#[cfg(test)]
pub(crate) fn test_group(verb: &str, tense: &str) -> QuestionGroup {
    QuestionGroup {
        verb: verb.to_string(),
        tense: tense.to_string(),
        english_meaning: String::new(),
        questions: Person::ALL
            .iter()
            .map(|p| test_question(verb, tense, *p, "x"))
            .collect(),
    }
}
