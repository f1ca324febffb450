use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteSynchronous},
    ConnectOptions, Pool, Sqlite,
};
use serde::{de::DeserializeOwned, Serialize};
use std::str::FromStr;

use crate::models::{GrammarQuestion, Question, QuestionGroup, SpeakingQuestion};

// One constant per logical key. All call sites go through the typed
// accessors below so a typo cannot silently create an orphaned key.
const KEY_CONJ_WRONG: &str = "conjugation_wrong_set";
const KEY_CONJ_ASKED: &str = "conjugation_asked_history";
const KEY_CONJ_ID_COUNTER: &str = "conjugation_id_counter";
const KEY_GRAMMAR_WRONG: &str = "grammar_wrong_set";
const KEY_GRAMMAR_ASKED: &str = "grammar_asked_history";
const KEY_GRAMMAR_PROMPT: &str = "grammar_last_prompt";
const KEY_SPEAKING_ASKED: &str = "speaking_asked_log";
const KEY_SPEAKING_QUESTIONS: &str = "speaking_questions";
const KEY_SPEAKING_INTRO: &str = "speaking_last_intro";

/// Asked-history logs are append-only; cap them so they cannot grow without
/// bound across months of sessions. Oldest entries are evicted first.
pub const ASKED_HISTORY_CAP: usize = 500;

#[derive(Clone)]
pub struct Db {
    pool: Pool<Sqlite>,
}

impl Db {
    pub async fn new(path: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(path)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .log_statements(log::LevelFilter::Trace);

        let pool = SqlitePool::connect_with(options).await?;

        let db = Db { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// In-memory database for tests.
    #[cfg(test)]
    pub async fn in_memory() -> anyhow::Result<Self> {
        Self::new("sqlite::memory:").await
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Missing key -> None. A value that no longer parses is treated the
    /// same way, with a warning: practice history is best-effort, never a
    /// reason to fail a session.
    async fn get<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        let Some((raw,)) = row else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                log::warn!("stored value under '{}' failed to parse, treating as absent: {}", key, e);
                Ok(None)
            }
        }
    }

    async fn put<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        let raw = serde_json::to_string(value)?;
        sqlx::query(
            "INSERT INTO kv (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(raw)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM kv WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // --- Conjugation mode ---

    pub async fn load_conjugation_wrong(&self) -> anyhow::Result<Vec<Question>> {
        Ok(self.get(KEY_CONJ_WRONG).await?.unwrap_or_default())
    }

    pub async fn save_conjugation_wrong(&self, items: &[Question]) -> anyhow::Result<()> {
        self.put(KEY_CONJ_WRONG, &items).await
    }

    pub async fn clear_conjugation_wrong(&self) -> anyhow::Result<()> {
        self.delete(KEY_CONJ_WRONG).await
    }

    pub async fn load_conjugation_asked(&self) -> anyhow::Result<Vec<QuestionGroup>> {
        Ok(self.get(KEY_CONJ_ASKED).await?.unwrap_or_default())
    }

    pub async fn append_conjugation_asked(&self, batch: &[QuestionGroup]) -> anyhow::Result<()> {
        let mut history = self.load_conjugation_asked().await?;
        history.extend_from_slice(batch);
        cap_history(&mut history);
        self.put(KEY_CONJ_ASKED, &history).await
    }

    /// Returns the current running question id and persists the bump, so
    /// ids stay monotonic across sessions.
    pub async fn take_question_ids(&self, count: u64) -> anyhow::Result<u64> {
        let next: u64 = self.get(KEY_CONJ_ID_COUNTER).await?.unwrap_or(0);
        self.put(KEY_CONJ_ID_COUNTER, &(next + count)).await?;
        Ok(next)
    }

    // --- Grammar mode ---

    pub async fn load_grammar_wrong(&self) -> anyhow::Result<Vec<GrammarQuestion>> {
        Ok(self.get(KEY_GRAMMAR_WRONG).await?.unwrap_or_default())
    }

    pub async fn save_grammar_wrong(&self, items: &[GrammarQuestion]) -> anyhow::Result<()> {
        self.put(KEY_GRAMMAR_WRONG, &items).await
    }

    pub async fn clear_grammar_wrong(&self) -> anyhow::Result<()> {
        self.delete(KEY_GRAMMAR_WRONG).await
    }

    pub async fn load_grammar_asked(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.get(KEY_GRAMMAR_ASKED).await?.unwrap_or_default())
    }

    pub async fn append_grammar_asked(&self, sentences: &[String]) -> anyhow::Result<()> {
        let mut history = self.load_grammar_asked().await?;
        history.extend_from_slice(sentences);
        cap_history(&mut history);
        self.put(KEY_GRAMMAR_ASKED, &history).await
    }

    pub async fn load_grammar_prompt(&self) -> anyhow::Result<Option<String>> {
        self.get(KEY_GRAMMAR_PROMPT).await
    }

    pub async fn save_grammar_prompt(&self, prompt: &str) -> anyhow::Result<()> {
        self.put(KEY_GRAMMAR_PROMPT, &prompt).await
    }

    // --- Speaking mode ---

    pub async fn load_speaking_asked(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.get(KEY_SPEAKING_ASKED).await?.unwrap_or_default())
    }

    pub async fn append_speaking_asked(&self, questions: &[String]) -> anyhow::Result<()> {
        let mut history = self.load_speaking_asked().await?;
        history.extend_from_slice(questions);
        cap_history(&mut history);
        self.put(KEY_SPEAKING_ASKED, &history).await
    }

    pub async fn load_speaking_questions(&self) -> anyhow::Result<Vec<SpeakingQuestion>> {
        Ok(self.get(KEY_SPEAKING_QUESTIONS).await?.unwrap_or_default())
    }

    pub async fn save_speaking_questions(&self, items: &[SpeakingQuestion]) -> anyhow::Result<()> {
        self.put(KEY_SPEAKING_QUESTIONS, &items).await
    }

    pub async fn clear_speaking_questions(&self) -> anyhow::Result<()> {
        self.delete(KEY_SPEAKING_QUESTIONS).await
    }

    pub async fn load_speaking_intro(&self) -> anyhow::Result<Option<String>> {
        self.get(KEY_SPEAKING_INTRO).await
    }

    pub async fn save_speaking_intro(&self, intro: &str) -> anyhow::Result<()> {
        self.put(KEY_SPEAKING_INTRO, &intro).await
    }
}

fn cap_history<T>(history: &mut Vec<T>) {
    if history.len() > ASKED_HISTORY_CAP {
        let excess = history.len() - ASKED_HISTORY_CAP;
        history.drain(..excess);
    }
}
