use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::oneshot;

use crate::db::Db;
use crate::gemini::{GeminiClient, GenerateError};
use crate::generator;
use crate::models::{
    answers_match, group_questions, GrammarQuestion, Person, Question, QuestionGroup,
    SpeakingQuestion,
};
use crate::wrong_set::WrongSet;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: String,
    /// Conjugation groups per fresh session.
    pub group_count: usize,
    pub grammar_count: usize,
    pub speaking_count: usize,
    /// Answering correctly during a review session removes the item from
    /// the wrong-set. The recommended default.
    pub remove_on_correct_in_review: bool,
    /// Also remove on correct answers during fresh sessions. Off unless
    /// explicitly enabled.
    pub remove_on_correct_always: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: "sqlite://tcf_tutor.db".to_string(),
            group_count: 10,
            grammar_count: 10,
            speaking_count: 5,
            remove_on_correct_in_review: true,
            remove_on_correct_always: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = std::env::var("TCF_DB_PATH") {
            config.db_path = path;
        }
        if let Ok(n) = std::env::var("TCF_GROUP_COUNT") {
            if let Ok(n) = n.parse() {
                config.group_count = n;
            }
        }
        if let Ok(v) = std::env::var("TCF_REMOVE_ON_CORRECT") {
            match v.as_str() {
                "always" => config.remove_on_correct_always = true,
                "never" => config.remove_on_correct_in_review = false,
                _ => {}
            }
        }
        config
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Menu,
    Conjugation,
    Grammar,
    Speaking,
}

/// Lifecycle of one quiz run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Presenting,
    Graded,
    Complete,
}

/// Result of the single in-flight generation call.
pub enum GenOutcome {
    Conjugation(Result<Vec<QuestionGroup>, GenerateError>),
    Grammar(Result<Vec<GrammarQuestion>, GenerateError>),
    Speaking(Result<Vec<SpeakingQuestion>, GenerateError>),
}

#[derive(Default)]
pub struct ConjSession {
    pub groups: Vec<QuestionGroup>,
    pub index: usize,
    pub review_mode: bool,
    /// One answer slot per Person::ALL entry.
    pub answers: [String; 3],
    pub focus: usize,
    pub last_correct: Option<bool>,
    pub score: usize,
}

#[derive(Default)]
pub struct GrammarSession {
    pub questions: Vec<GrammarQuestion>,
    pub index: usize,
    pub review_mode: bool,
    pub input: String,
    pub theme: String,
    pub last_correct: Option<bool>,
    pub score: usize,
}

#[derive(Default)]
pub struct SpeakingState {
    pub intro: String,
    pub stored: Vec<SpeakingQuestion>,
    /// Ids from the most recent generation, shown by default.
    pub latest: Vec<String>,
    pub show_all: bool,
    pub selected: usize,
    pub expanded: Vec<String>,
}

pub struct App {
    pub db: Db,
    pub client: GeminiClient,
    pub config: AppConfig,
    pub screen: Screen,
    pub menu_selection: usize,
    pub exit: bool,
    pub status: Option<String>,

    pub conj_phase: Phase,
    pub conj: ConjSession,
    pub conj_wrong: WrongSet<Question>,

    pub grammar_phase: Phase,
    pub grammar: GrammarSession,
    pub grammar_wrong: WrongSet<GrammarQuestion>,

    pub speaking_loading: bool,
    pub speaking: SpeakingState,

    pending: Option<oneshot::Receiver<GenOutcome>>,
}

impl App {
    pub async fn new(db: Db, client: GeminiClient, config: AppConfig) -> anyhow::Result<Self> {
        let conj_wrong = WrongSet::new(db.load_conjugation_wrong().await?);
        let grammar_wrong = WrongSet::new(db.load_grammar_wrong().await?);

        let mut speaking = SpeakingState {
            stored: db.load_speaking_questions().await?,
            ..Default::default()
        };
        if let Some(intro) = db.load_speaking_intro().await? {
            speaking.intro = intro;
        }

        let mut grammar = GrammarSession::default();
        if let Some(theme) = db.load_grammar_prompt().await? {
            grammar.theme = theme;
        }

        Ok(Self {
            db,
            client,
            config,
            screen: Screen::Menu,
            menu_selection: 0,
            exit: false,
            status: None,
            conj_phase: Phase::Idle,
            conj: ConjSession::default(),
            conj_wrong,
            grammar_phase: Phase::Idle,
            grammar,
            grammar_wrong,
            speaking_loading: false,
            speaking,
            pending: None,
        })
    }

    pub fn loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Called every tick: collect the in-flight generation result, if any.
    pub async fn poll_generation(&mut self) -> anyhow::Result<()> {
        let Some(rx) = &mut self.pending else {
            return Ok(());
        };
        let outcome = match rx.try_recv() {
            Ok(outcome) => outcome,
            Err(oneshot::error::TryRecvError::Empty) => return Ok(()),
            Err(oneshot::error::TryRecvError::Closed) => {
                self.pending = None;
                self.fail_loading("La génération a été interrompue.");
                return Ok(());
            }
        };
        self.pending = None;

        match outcome {
            GenOutcome::Conjugation(Ok(groups)) => {
                self.conj = ConjSession {
                    groups,
                    ..Default::default()
                };
                self.conj_phase = Phase::Presenting;
                self.status = None;
            }
            GenOutcome::Conjugation(Err(e)) => {
                self.conj_phase = Phase::Idle;
                self.report_generate_error(e);
            }
            GenOutcome::Grammar(Ok(questions)) => {
                let theme = std::mem::take(&mut self.grammar.theme);
                self.grammar = GrammarSession {
                    questions,
                    theme,
                    ..Default::default()
                };
                self.grammar_phase = Phase::Presenting;
                self.status = None;
            }
            GenOutcome::Grammar(Err(e)) => {
                self.grammar_phase = Phase::Idle;
                self.report_generate_error(e);
            }
            GenOutcome::Speaking(result) => {
                self.speaking_loading = false;
                match result {
                    Ok(questions) => self.accept_speaking(questions).await?,
                    Err(e) => self.report_generate_error(e),
                }
            }
        }
        Ok(())
    }

    fn fail_loading(&mut self, message: &str) {
        if self.conj_phase == Phase::Loading {
            self.conj_phase = Phase::Idle;
        }
        if self.grammar_phase == Phase::Loading {
            self.grammar_phase = Phase::Idle;
        }
        self.speaking_loading = false;
        self.status = Some(message.to_string());
    }

    fn report_generate_error(&mut self, e: GenerateError) {
        log::warn!("generation failed: {}", e);
        self.status = Some(match e {
            GenerateError::Empty => "Aucune nouvelle question générée.".to_string(),
            _ => "Erreur lors de la génération des questions.".to_string(),
        });
    }

    // --- Conjugation mode ---

    pub fn start_conjugation_new(&mut self) {
        if self.pending.is_some() {
            return;
        }
        self.conj_phase = Phase::Loading;
        self.status = None;

        let client = self.client.clone();
        let db = self.db.clone();
        let count = self.config.group_count;
        let wrong_pool: Vec<Question> = self.conj_wrong.items().to_vec();

        let (tx, rx) = oneshot::channel();
        self.pending = Some(rx);
        tokio::spawn(async move {
            let mut rng = StdRng::from_entropy();
            let result =
                generator::generate_conjugation_groups(&client, &db, count, &wrong_pool, &[], &mut rng)
                    .await;
            let _ = tx.send(GenOutcome::Conjugation(result));
        });
    }

    /// Review sessions load straight from the wrong-set; disallowed (no-op)
    /// when it is empty.
    pub fn start_conjugation_review(&mut self) {
        if self.pending.is_some() || self.conj_wrong.is_empty() {
            return;
        }
        let groups = group_questions(self.conj_wrong.items());
        if groups.is_empty() {
            self.status = Some("Aucun groupe complet à revoir.".to_string());
            return;
        }
        self.conj = ConjSession {
            groups,
            review_mode: true,
            ..Default::default()
        };
        self.conj_phase = Phase::Presenting;
        self.status = None;
    }

    pub fn current_group(&self) -> Option<&QuestionGroup> {
        self.conj.groups.get(self.conj.index)
    }

    pub async fn submit_conjugation(&mut self) -> anyhow::Result<()> {
        if self.conj_phase != Phase::Presenting {
            return Ok(());
        }
        let Some(group) = self.current_group().cloned() else {
            return Ok(());
        };

        let all_correct = Person::ALL.iter().enumerate().all(|(slot, person)| {
            group
                .questions
                .iter()
                .find(|q| q.person == *person)
                .map(|q| answers_match(&self.conj.answers[slot], &q.answer))
                .unwrap_or(false)
        });

        if all_correct {
            self.conj.score += 1;
            let remove = (self.conj.review_mode && self.config.remove_on_correct_in_review)
                || self.config.remove_on_correct_always;
            if remove {
                self.conj_wrong.remove_group(&group);
                self.db.save_conjugation_wrong(self.conj_wrong.items()).await?;
            }
        } else {
            self.conj_wrong.insert_group(&group);
            self.db.save_conjugation_wrong(self.conj_wrong.items()).await?;
        }

        self.conj.last_correct = Some(all_correct);
        self.conj_phase = Phase::Graded;
        Ok(())
    }

    pub fn next_conjugation(&mut self) {
        if self.conj_phase != Phase::Graded {
            return;
        }
        self.conj.answers = Default::default();
        self.conj.focus = 0;
        self.conj.last_correct = None;
        if self.conj.index + 1 >= self.conj.groups.len() {
            self.conj_phase = Phase::Complete;
        } else {
            self.conj.index += 1;
            self.conj_phase = Phase::Presenting;
        }
    }

    /// Drop the current group from both the working batch and the wrong-set
    /// (review mode only). The index clamps to the new last group when the
    /// tail was deleted.
    pub async fn delete_current_group(&mut self) -> anyhow::Result<()> {
        if !self.conj.review_mode
            || !matches!(self.conj_phase, Phase::Presenting | Phase::Graded)
        {
            return Ok(());
        }
        let Some(group) = self.current_group().cloned() else {
            return Ok(());
        };

        self.conj.groups.remove(self.conj.index);
        self.conj_wrong.remove_group(&group);
        self.db.save_conjugation_wrong(self.conj_wrong.items()).await?;

        self.conj.answers = Default::default();
        self.conj.focus = 0;
        self.conj.last_correct = None;

        if self.conj.groups.is_empty() {
            self.conj_phase = Phase::Idle;
        } else {
            if self.conj.index >= self.conj.groups.len() {
                self.conj.index = self.conj.groups.len() - 1;
            }
            self.conj_phase = Phase::Presenting;
        }
        Ok(())
    }

    pub async fn clear_conjugation_wrong(&mut self) -> anyhow::Result<()> {
        self.conj_wrong.clear();
        self.db.clear_conjugation_wrong().await?;
        self.status = Some("Liste d'erreurs effacée.".to_string());
        Ok(())
    }

    // --- Grammar mode ---

    pub async fn start_grammar_new(&mut self) -> anyhow::Result<()> {
        if self.pending.is_some() || self.grammar.theme.trim().is_empty() {
            return Ok(());
        }
        self.db.save_grammar_prompt(&self.grammar.theme).await?;
        self.grammar_phase = Phase::Loading;
        self.status = None;

        let client = self.client.clone();
        let db = self.db.clone();
        let theme = self.grammar.theme.clone();
        let count = self.config.grammar_count;

        let (tx, rx) = oneshot::channel();
        self.pending = Some(rx);
        tokio::spawn(async move {
            let result = generator::generate_grammar_questions(&client, &db, &theme, count).await;
            let _ = tx.send(GenOutcome::Grammar(result));
        });
        Ok(())
    }

    pub fn start_grammar_review(&mut self) {
        if self.pending.is_some() || self.grammar_wrong.is_empty() {
            return;
        }
        let theme = std::mem::take(&mut self.grammar.theme);
        self.grammar = GrammarSession {
            questions: self.grammar_wrong.items().to_vec(),
            review_mode: true,
            theme,
            ..Default::default()
        };
        self.grammar_phase = Phase::Presenting;
        self.status = None;
    }

    pub fn current_grammar(&self) -> Option<&GrammarQuestion> {
        self.grammar.questions.get(self.grammar.index)
    }

    pub async fn submit_grammar(&mut self) -> anyhow::Result<()> {
        if self.grammar_phase != Phase::Presenting {
            return Ok(());
        }
        let Some(question) = self.current_grammar().cloned() else {
            return Ok(());
        };

        let correct = answers_match(&self.grammar.input, &question.answer);
        if correct {
            self.grammar.score += 1;
            let remove = (self.grammar.review_mode && self.config.remove_on_correct_in_review)
                || self.config.remove_on_correct_always;
            if remove && self.grammar_wrong.remove(&question.id) {
                self.db.save_grammar_wrong(self.grammar_wrong.items()).await?;
            }
        } else {
            self.grammar_wrong.insert(question);
            self.db.save_grammar_wrong(self.grammar_wrong.items()).await?;
        }

        self.grammar.last_correct = Some(correct);
        self.grammar_phase = Phase::Graded;
        Ok(())
    }

    pub fn next_grammar(&mut self) {
        if self.grammar_phase != Phase::Graded {
            return;
        }
        self.grammar.input.clear();
        self.grammar.last_correct = None;
        if self.grammar.index + 1 >= self.grammar.questions.len() {
            self.grammar_phase = Phase::Complete;
        } else {
            self.grammar.index += 1;
            self.grammar_phase = Phase::Presenting;
        }
    }

    pub async fn delete_current_grammar(&mut self) -> anyhow::Result<()> {
        if !self.grammar.review_mode
            || !matches!(self.grammar_phase, Phase::Presenting | Phase::Graded)
        {
            return Ok(());
        }
        let Some(question) = self.current_grammar().cloned() else {
            return Ok(());
        };

        self.grammar.questions.remove(self.grammar.index);
        self.grammar_wrong.remove(&question.id);
        self.db.save_grammar_wrong(self.grammar_wrong.items()).await?;

        self.grammar.input.clear();
        self.grammar.last_correct = None;

        if self.grammar.questions.is_empty() {
            self.grammar_phase = Phase::Idle;
        } else {
            if self.grammar.index >= self.grammar.questions.len() {
                self.grammar.index = self.grammar.questions.len() - 1;
            }
            self.grammar_phase = Phase::Presenting;
        }
        Ok(())
    }

    pub async fn clear_grammar_wrong(&mut self) -> anyhow::Result<()> {
        self.grammar_wrong.clear();
        self.db.clear_grammar_wrong().await?;
        self.status = Some("Liste d'erreurs effacée.".to_string());
        Ok(())
    }

    // --- Speaking mode ---

    pub async fn start_speaking_generation(&mut self) -> anyhow::Result<()> {
        if self.pending.is_some() || self.speaking.intro.trim().is_empty() {
            return Ok(());
        }
        self.db.save_speaking_intro(&self.speaking.intro).await?;
        self.speaking_loading = true;
        self.status = None;

        let client = self.client.clone();
        let db = self.db.clone();
        let intro = self.speaking.intro.clone();
        let count = self.config.speaking_count;

        let (tx, rx) = oneshot::channel();
        self.pending = Some(rx);
        tokio::spawn(async move {
            let result = generator::generate_speaking_questions(&client, &db, &intro, count).await;
            let _ = tx.send(GenOutcome::Speaking(result));
        });
        Ok(())
    }

    async fn accept_speaking(&mut self, questions: Vec<SpeakingQuestion>) -> anyhow::Result<()> {
        let unique: Vec<SpeakingQuestion> = questions
            .into_iter()
            .filter(|q| {
                !self
                    .speaking
                    .stored
                    .iter()
                    .any(|s| s.id == q.id || s.question == q.question)
            })
            .collect();

        if unique.is_empty() {
            self.status =
                Some("Aucune nouvelle question. Essayez une autre introduction.".to_string());
            return Ok(());
        }

        self.speaking.latest = unique.iter().map(|q| q.id.clone()).collect();
        self.speaking.stored.extend(unique);
        self.db.save_speaking_questions(&self.speaking.stored).await?;
        self.speaking.show_all = false;
        self.speaking.selected = 0;
        self.status = None;
        Ok(())
    }

    /// The questions the speaking screen lists: everything stored in
    /// review mode (grouped newest date first, insertion order within a
    /// date), otherwise just the latest generation.
    pub fn visible_speaking(&self) -> Vec<&SpeakingQuestion> {
        if self.speaking.show_all {
            let mut all: Vec<&SpeakingQuestion> = self.speaking.stored.iter().collect();
            // ISO dates compare lexicographically; the sort is stable.
            all.sort_by(|a, b| b.date.cmp(&a.date));
            all
        } else {
            self.speaking
                .stored
                .iter()
                .filter(|q| self.speaking.latest.contains(&q.id))
                .collect()
        }
    }

    pub async fn delete_selected_speaking(&mut self) -> anyhow::Result<()> {
        let visible = self.visible_speaking();
        let Some(question) = visible.get(self.speaking.selected) else {
            return Ok(());
        };
        let id = question.id.clone();

        self.speaking.stored.retain(|q| q.id != id);
        self.speaking.latest.retain(|q| *q != id);
        self.db.save_speaking_questions(&self.speaking.stored).await?;

        let remaining = self.visible_speaking().len();
        if remaining > 0 && self.speaking.selected >= remaining {
            self.speaking.selected = remaining - 1;
        }
        Ok(())
    }

    pub async fn clear_speaking(&mut self) -> anyhow::Result<()> {
        self.speaking.stored.clear();
        self.speaking.latest.clear();
        self.speaking.expanded.clear();
        self.speaking.selected = 0;
        self.db.clear_speaking_questions().await?;
        Ok(())
    }

    fn toggle_speaking_expanded(&mut self) {
        let visible = self.visible_speaking();
        let Some(question) = visible.get(self.speaking.selected) else {
            return;
        };
        let id = question.id.clone();
        if let Some(pos) = self.speaking.expanded.iter().position(|e| *e == id) {
            self.speaking.expanded.remove(pos);
        } else {
            self.speaking.expanded.push(id);
        }
    }

    // --- Input dispatch ---

    pub async fn handle_key(&mut self, key: KeyEvent) -> anyhow::Result<()> {
        if key.kind != KeyEventKind::Press {
            return Ok(());
        }
        match self.screen {
            Screen::Menu => self.handle_menu_key(key),
            Screen::Conjugation => self.handle_conjugation_key(key).await?,
            Screen::Grammar => self.handle_grammar_key(key).await?,
            Screen::Speaking => self.handle_speaking_key(key).await?,
        }
        Ok(())
    }

    fn handle_menu_key(&mut self, key: KeyEvent) {
        const ENTRIES: usize = 3;
        match key.code {
            KeyCode::Up => {
                self.menu_selection = (self.menu_selection + ENTRIES - 1) % ENTRIES;
            }
            KeyCode::Down => {
                self.menu_selection = (self.menu_selection + 1) % ENTRIES;
            }
            KeyCode::Enter => {
                self.screen = match self.menu_selection {
                    0 => Screen::Conjugation,
                    1 => Screen::Grammar,
                    _ => Screen::Speaking,
                };
                self.status = None;
            }
            KeyCode::Char('q') => self.exit = true,
            _ => {}
        }
    }

    async fn handle_conjugation_key(&mut self, key: KeyEvent) -> anyhow::Result<()> {
        if key.code == KeyCode::Esc {
            self.screen = Screen::Menu;
            return Ok(());
        }
        match self.conj_phase {
            Phase::Idle | Phase::Complete => match key.code {
                KeyCode::Char('n') => self.start_conjugation_new(),
                KeyCode::Char('r') => self.start_conjugation_review(),
                KeyCode::Char('c') => self.clear_conjugation_wrong().await?,
                _ => {}
            },
            Phase::Loading => {}
            Phase::Presenting => {
                if key.modifiers.contains(KeyModifiers::CONTROL) {
                    if key.code == KeyCode::Char('d') {
                        self.delete_current_group().await?;
                    }
                    return Ok(());
                }
                match key.code {
                    KeyCode::Tab | KeyCode::Down => {
                        self.conj.focus = (self.conj.focus + 1) % Person::ALL.len();
                    }
                    KeyCode::BackTab | KeyCode::Up => {
                        self.conj.focus =
                            (self.conj.focus + Person::ALL.len() - 1) % Person::ALL.len();
                    }
                    KeyCode::Backspace => {
                        self.conj.answers[self.conj.focus].pop();
                    }
                    KeyCode::Enter => self.submit_conjugation().await?,
                    KeyCode::Char(c) => self.conj.answers[self.conj.focus].push(c),
                    _ => {}
                }
            }
            Phase::Graded => {
                if key.modifiers.contains(KeyModifiers::CONTROL)
                    && key.code == KeyCode::Char('d')
                {
                    self.delete_current_group().await?;
                    return Ok(());
                }
                if matches!(key.code, KeyCode::Enter | KeyCode::Char(' ')) {
                    self.next_conjugation();
                }
            }
        }
        Ok(())
    }

    async fn handle_grammar_key(&mut self, key: KeyEvent) -> anyhow::Result<()> {
        if key.code == KeyCode::Esc {
            self.screen = Screen::Menu;
            return Ok(());
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('r') => self.start_grammar_review(),
                KeyCode::Char('l') => self.clear_grammar_wrong().await?,
                KeyCode::Char('d') => self.delete_current_grammar().await?,
                _ => {}
            }
            return Ok(());
        }
        match self.grammar_phase {
            Phase::Idle | Phase::Complete => match key.code {
                KeyCode::Enter => self.start_grammar_new().await?,
                KeyCode::Backspace => {
                    self.grammar.theme.pop();
                }
                KeyCode::Char(c) => self.grammar.theme.push(c),
                _ => {}
            },
            Phase::Loading => {}
            Phase::Presenting => match key.code {
                KeyCode::Enter => self.submit_grammar().await?,
                KeyCode::Backspace => {
                    self.grammar.input.pop();
                }
                KeyCode::Char(c) => self.grammar.input.push(c),
                _ => {}
            },
            Phase::Graded => {
                if matches!(key.code, KeyCode::Enter | KeyCode::Char(' ')) {
                    self.next_grammar();
                }
            }
        }
        Ok(())
    }

    async fn handle_speaking_key(&mut self, key: KeyEvent) -> anyhow::Result<()> {
        if key.code == KeyCode::Esc {
            self.screen = Screen::Menu;
            return Ok(());
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('r') => {
                    self.speaking.show_all = !self.speaking.show_all;
                    self.speaking.selected = 0;
                }
                KeyCode::Char('d') => self.delete_selected_speaking().await?,
                KeyCode::Char('l') => self.clear_speaking().await?,
                _ => {}
            }
            return Ok(());
        }
        match key.code {
            KeyCode::Enter => self.start_speaking_generation().await?,
            KeyCode::Backspace => {
                self.speaking.intro.pop();
            }
            KeyCode::Up => {
                self.speaking.selected = self.speaking.selected.saturating_sub(1);
            }
            KeyCode::Down => {
                let count = self.visible_speaking().len();
                if count > 0 && self.speaking.selected + 1 < count {
                    self.speaking.selected += 1;
                }
            }
            KeyCode::Tab => self.toggle_speaking_expanded(),
            KeyCode::Char(c) => self.speaking.intro.push(c),
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod app_tests;
