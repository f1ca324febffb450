use crate::models::{GrammarQuestion, Question, QuestionGroup, QuestionKey};

/// Something a wrong-set can deduplicate on.
pub trait Identify {
    type Key: PartialEq;
    fn key(&self) -> Self::Key;
}

impl Identify for Question {
    type Key = QuestionKey;
    fn key(&self) -> QuestionKey {
        Question::key(self)
    }
}

impl Identify for GrammarQuestion {
    type Key = String;
    fn key(&self) -> String {
        self.id.clone()
    }
}

/// Insertion-ordered collection of missed records, deduplicated by
/// identity. Persistence is owned by the caller, which writes the full
/// ordered sequence after every mutation.
#[derive(Debug, Clone)]
pub struct WrongSet<T: Identify> {
    items: Vec<T>,
}

impl<T: Identify> Default for WrongSet<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Identify> WrongSet<T> {
    pub fn new(items: Vec<T>) -> Self {
        let mut set = Self { items: Vec::new() };
        for item in items {
            set.insert(item);
        }
        set
    }

    pub fn contains(&self, key: &T::Key) -> bool {
        self.items.iter().any(|i| i.key() == *key)
    }

    /// Idempotent: inserting an identity already present is a no-op.
    pub fn insert(&mut self, item: T) {
        if !self.contains(&item.key()) {
            self.items.push(item);
        }
    }

    pub fn remove(&mut self, key: &T::Key) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.key() != *key);
        before != self.items.len()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }
}

impl WrongSet<Question> {
    /// Merge a missed group: each member question is inserted by its
    /// (verb, tense, person) key, so a group already partially present
    /// gains only its missing persons and never duplicates.
    pub fn insert_group(&mut self, group: &QuestionGroup) {
        for q in &group.questions {
            self.insert(q.clone());
        }
    }

    pub fn remove_group(&mut self, group: &QuestionGroup) {
        for q in &group.questions {
            self.remove(&q.key());
        }
    }

    /// Count of distinct verbs, shown on the review control.
    pub fn distinct_verbs(&self) -> usize {
        let mut verbs: Vec<String> = Vec::new();
        for q in &self.items {
            let v = q.verb.trim().to_lowercase();
            if !verbs.contains(&v) {
                verbs.push(v);
            }
        }
        verbs.len()
    }
}
