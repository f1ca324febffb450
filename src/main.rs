mod app;
mod db;
mod gemini;
mod generator;
mod models;
mod prompts;
mod tui;
mod ui;
mod wrong_set;

use std::time::Duration;

use app::{App, AppConfig};
use crossterm::event::{self, Event};
use db::Db;
use gemini::GeminiClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = AppConfig::from_env();
    let api_key = std::env::var("GEMINI_API_KEY")
        .map_err(|_| anyhow::anyhow!("GEMINI_API_KEY is not set"))?;

    let db = Db::new(&config.db_path).await?;
    let client = GeminiClient::new(api_key);
    let mut app = App::new(db, client, config).await?;

    let mut terminal = tui::init()?;
    let res = run_app(&mut terminal, &mut app).await;
    tui::restore()?;

    res
}

async fn run_app(terminal: &mut tui::Tui, app: &mut App) -> anyhow::Result<()> {
    while !app.exit {
        app.poll_generation().await?;
        terminal.draw(|frame| ui::render(frame, app))?;

        if event::poll(Duration::from_millis(16))? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key).await?;
            }
        }
    }
    Ok(())
}
