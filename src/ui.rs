use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, Phase, Screen};
use crate::models::Person;

pub fn render(f: &mut Frame, app: &App) {
    match app.screen {
        Screen::Menu => draw_menu(f, app),
        Screen::Conjugation => draw_conjugation(f, app),
        Screen::Grammar => draw_grammar(f, app),
        Screen::Speaking => draw_speaking(f, app),
    }
}

fn draw_menu(f: &mut Frame, app: &App) {
    let block = Block::default().title(" TCF Tutor ").borders(Borders::ALL);

    let entries = [
        "Conjugaison (groupes je/nous/ils)",
        "Grammaire (phrases à trous)",
        "Expression orale (TCF Canada)",
    ];
    let mut lines: Vec<Line> = entries
        .iter()
        .enumerate()
        .map(|(i, label)| {
            if i == app.menu_selection {
                Line::from(Span::styled(
                    format!("> {}", label),
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                ))
            } else {
                Line::from(format!("  {}", label))
            }
        })
        .collect();
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Entrée: ouvrir | q: quitter",
        Style::default().fg(Color::Gray),
    )));

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(35),
            Constraint::Min(7),
            Constraint::Percentage(35),
        ])
        .split(f.area());

    let p = Paragraph::new(lines).block(block).alignment(Alignment::Center);
    f.render_widget(p, chunks[1]);
}

fn draw_conjugation(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(2)])
        .split(f.area());

    let mode = if app.conj.review_mode { "révision" } else { "nouveau" };
    let header = format!(
        " Conjugaison [{}] | score {} / {} | erreurs: {} verbe(s) ",
        mode,
        app.conj.score,
        app.conj.groups.len(),
        app.conj_wrong.distinct_verbs(),
    );
    f.render_widget(
        Paragraph::new(header).block(Block::default().borders(Borders::ALL)),
        chunks[0],
    );

    match app.conj_phase {
        Phase::Idle => {
            let mut lines = vec![
                Line::from("n: nouvelle session"),
                Line::from(format!(
                    "r: réviser les erreurs ({})",
                    app.conj_wrong.len()
                )),
                Line::from("c: effacer les erreurs"),
                Line::from("Échap: menu"),
            ];
            if let Some(status) = &app.status {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(
                    status.clone(),
                    Style::default().fg(Color::Red),
                )));
            }
            f.render_widget(
                Paragraph::new(lines).block(Block::default().borders(Borders::ALL)),
                chunks[1],
            );
        }
        Phase::Loading => draw_loading(f, chunks[1]),
        Phase::Presenting | Phase::Graded => draw_group_card(f, app, chunks[1]),
        Phase::Complete => {
            let title = if app.conj.review_mode {
                "Révision terminée"
            } else {
                "Session terminée"
            };
            let lines = vec![
                Line::from(Span::styled(
                    title,
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                )),
                Line::from(format!("Score: {} / {}", app.conj.score, app.conj.groups.len())),
                Line::from(""),
                Line::from("n: nouvelle session | r: réviser | Échap: menu"),
            ];
            f.render_widget(
                Paragraph::new(lines)
                    .alignment(Alignment::Center)
                    .block(Block::default().borders(Borders::ALL)),
                chunks[1],
            );
        }
    }

    let hint = match app.conj_phase {
        Phase::Presenting => "Tab: champ suivant | Entrée: vérifier | Ctrl+D: supprimer (révision)",
        Phase::Graded => "Entrée: suivant | Ctrl+D: supprimer (révision)",
        _ => "",
    };
    f.render_widget(
        Paragraph::new(hint).style(Style::default().fg(Color::Gray)),
        chunks[2],
    );
}

fn draw_group_card(f: &mut Frame, app: &App, area: Rect) {
    let Some(group) = app.current_group() else {
        return;
    };

    let title = format!(
        " {} / {} — {} ({}) — {} ",
        app.conj.index + 1,
        app.conj.groups.len(),
        group.verb,
        group.tense,
        group.english_meaning,
    );
    let block = Block::default().title(title).borders(Borders::ALL);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(inner);

    for (slot, person) in Person::ALL.iter().enumerate() {
        let focused = app.conj_phase == Phase::Presenting && app.conj.focus == slot;
        let style = if focused {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        let input = Paragraph::new(app.conj.answers[slot].as_str()).style(style).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} ", person)),
        );
        f.render_widget(input, chunks[slot]);
    }

    if app.conj_phase == Phase::Graded {
        let mut lines = Vec::new();
        match app.conj.last_correct {
            Some(true) => lines.push(Line::from(Span::styled(
                "Correct !",
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ))),
            _ => {
                lines.push(Line::from(Span::styled(
                    "Incorrect.",
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )));
                for person in Person::ALL {
                    if let Some(q) = group.questions.iter().find(|q| q.person == person) {
                        lines.push(Line::from(format!("{}: {}", person, q.answer)));
                    }
                }
            }
        }
        f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), chunks[3]);
    }
}

fn draw_grammar(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(2)])
        .split(f.area());

    let mode = if app.grammar.review_mode { "révision" } else { "nouveau" };
    let header = format!(
        " Grammaire [{}] | score {} / {} | erreurs: {} ",
        mode,
        app.grammar.score,
        app.grammar.questions.len(),
        app.grammar_wrong.len(),
    );
    f.render_widget(
        Paragraph::new(header).block(Block::default().borders(Borders::ALL)),
        chunks[0],
    );

    match app.grammar_phase {
        Phase::Idle | Phase::Complete => {
            let mut lines = Vec::new();
            if app.grammar_phase == Phase::Complete {
                lines.push(Line::from(Span::styled(
                    format!(
                        "Quiz terminé — score {} / {}",
                        app.grammar.score,
                        app.grammar.questions.len()
                    ),
                    Style::default().fg(Color::Green),
                )));
                lines.push(Line::from(""));
            }
            lines.push(Line::from("Thème pour la génération:"));
            lines.push(Line::from(Span::styled(
                format!("> {}", app.grammar.theme),
                Style::default().fg(Color::Yellow),
            )));
            lines.push(Line::from(""));
            lines.push(Line::from("Entrée: générer | Ctrl+R: réviser | Ctrl+L: effacer les erreurs"));
            if let Some(status) = &app.status {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(
                    status.clone(),
                    Style::default().fg(Color::Red),
                )));
            }
            f.render_widget(
                Paragraph::new(lines)
                    .wrap(Wrap { trim: true })
                    .block(Block::default().borders(Borders::ALL)),
                chunks[1],
            );
        }
        Phase::Loading => draw_loading(f, chunks[1]),
        Phase::Presenting | Phase::Graded => {
            if let Some(q) = app.current_grammar() {
                let title = format!(" {} / {} ", app.grammar.index + 1, app.grammar.questions.len());
                let block = Block::default().title(title).borders(Borders::ALL);
                let inner = block.inner(chunks[1]);
                f.render_widget(block, chunks[1]);

                let parts = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([
                        Constraint::Length(2),
                        Constraint::Length(3),
                        Constraint::Min(0),
                    ])
                    .split(inner);

                f.render_widget(
                    Paragraph::new(q.sentence.as_str()).wrap(Wrap { trim: true }),
                    parts[0],
                );
                f.render_widget(
                    Paragraph::new(app.grammar.input.as_str())
                        .block(Block::default().borders(Borders::ALL).title(" Réponse ")),
                    parts[1],
                );

                if app.grammar_phase == Phase::Graded {
                    let line = match app.grammar.last_correct {
                        Some(true) => Line::from(Span::styled(
                            "Correct !",
                            Style::default().fg(Color::Green),
                        )),
                        _ => Line::from(Span::styled(
                            format!("Incorrect. Réponse: {}", q.answer),
                            Style::default().fg(Color::Red),
                        )),
                    };
                    f.render_widget(Paragraph::new(line), parts[2]);
                }
            }
        }
    }

    let hint = match app.grammar_phase {
        Phase::Presenting => "Entrée: vérifier | Ctrl+D: supprimer (révision) | Échap: menu",
        Phase::Graded => "Entrée: suivant | Échap: menu",
        _ => "Échap: menu",
    };
    f.render_widget(
        Paragraph::new(hint).style(Style::default().fg(Color::Gray)),
        chunks[2],
    );
}

fn draw_speaking(f: &mut Frame, app: &App) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(f.area());

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(4)])
        .split(columns[0]);

    f.render_widget(
        Paragraph::new(app.speaking.intro.as_str())
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Présentez-vous "),
            ),
        left[0],
    );

    let mut help = vec![Line::from(
        "Entrée: générer | Ctrl+R: tout voir / dernières | Échap: menu",
    )];
    help.push(Line::from("↑/↓: sélection | Tab: réponse | Ctrl+D: supprimer | Ctrl+L: tout effacer"));
    if let Some(status) = &app.status {
        help.push(Line::from(Span::styled(
            status.clone(),
            Style::default().fg(Color::Red),
        )));
    }
    f.render_widget(Paragraph::new(help).style(Style::default().fg(Color::Gray)), left[1]);

    let title = if app.speaking_loading {
        " Génération en cours... ".to_string()
    } else if app.speaking.show_all {
        format!(" Questions sauvegardées ({}) ", app.speaking.stored.len())
    } else {
        " Dernières questions ".to_string()
    };
    let block = Block::default().title(title).borders(Borders::ALL);
    let inner = block.inner(columns[1]);
    f.render_widget(block, columns[1]);

    let visible = app.visible_speaking();
    let mut lines: Vec<Line> = Vec::new();
    if visible.is_empty() {
        lines.push(Line::from(Span::styled(
            "Aucune question. Entrez votre introduction puis Entrée.",
            Style::default().fg(Color::Gray),
        )));
    }
    let mut last_date: Option<&str> = None;
    for (i, q) in visible.iter().enumerate() {
        if app.speaking.show_all && last_date != Some(q.date.as_str()) {
            lines.push(Line::from(Span::styled(
                format!("─ {} ─", q.date),
                Style::default().fg(Color::DarkGray),
            )));
            last_date = Some(q.date.as_str());
        }
        let marker = if i == app.speaking.selected { "> " } else { "  " };
        let style = if i == app.speaking.selected {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        let line = if app.speaking.show_all {
            format!("{}{}", marker, q.question)
        } else {
            format!("{}[{}] {}", marker, q.date, q.question)
        };
        lines.push(Line::from(Span::styled(line, style)));
        if app.speaking.expanded.contains(&q.id) {
            lines.push(Line::from(Span::styled(
                format!("    {}", q.answer),
                Style::default().fg(Color::Cyan),
            )));
        }
    }
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
}

fn draw_loading(f: &mut Frame, area: Rect) {
    let p = Paragraph::new("Génération en cours...")
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(p, area);
}
