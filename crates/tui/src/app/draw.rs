use gamerec_core::{
    feedback::Feedback,
    library::{LibraryChoice, LibraryTab},
    models::{Game, GameId},
    profile::{accuracy_percent, bar_fraction, BAR_SCALE},
    recommend::RecommendationResult,
    survey::Category,
};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph, Tabs, Wrap},
    Frame,
};

use super::{
    theme::Theme, AccountField, Confirm, GameRecApp, ListCursor, Mode, Overlay, Panel, RecsState,
    Screen,
};

impl GameRecApp {
    pub(super) fn draw(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(5),
                Constraint::Length(3),
            ])
            .split(frame.size());

        self.render_nav(frame, chunks[0]);
        match self.screen {
            Screen::Home => self.draw_home(frame, chunks[1]),
            Screen::Recommendations => self.draw_recommendations(frame, chunks[1]),
            Screen::Survey => self.draw_survey(frame, chunks[1]),
            Screen::Detail => self.draw_detail(frame, chunks[1]),
            Screen::Library => self.draw_library(frame, chunks[1]),
            Screen::History => self.draw_history(frame, chunks[1]),
            Screen::Profile => self.draw_profile(frame, chunks[1]),
        }
        self.render_status(frame, chunks[2]);

        match &self.overlay {
            Some(Overlay::Account(_)) => self.render_account(frame),
            Some(Overlay::Confirm(confirm)) => self.render_confirm(frame, confirm),
            Some(Overlay::Chooser(_)) => self.render_chooser(frame),
            None => {}
        }
    }

    fn render_nav(&self, frame: &mut Frame, area: Rect) {
        let titles: Vec<Line> = Screen::NAV
            .iter()
            .enumerate()
            .map(|(idx, screen)| Line::from(format!("{} {}", idx + 1, screen.title())))
            .collect();
        let selected = Screen::NAV.iter().position(|screen| *screen == self.screen);
        let account = match self.session.user() {
            Some(user) => format!("GameRec · {user} (a: log out)"),
            None => "GameRec · guest (a: log in)".to_string(),
        };
        let mut tabs = Tabs::new(titles)
            .block(Block::default().borders(Borders::ALL).title(account))
            .style(Style::default().fg(self.theme.muted))
            .highlight_style(
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            );
        if let Some(index) = selected {
            tabs = tabs.select(index);
        }
        frame.render_widget(tabs, area);
    }

    fn feedback_badge(&self, game_id: &GameId) -> Span<'static> {
        let state = self.feedback.state(game_id);
        let color = match state {
            Feedback::Liked => self.theme.success,
            Feedback::Disliked => self.theme.danger,
            Feedback::Unrated => self.theme.muted,
        };
        let mut text = format!(" [{}]", state.label());
        if self.feedback.is_pending(game_id) {
            text.push('…');
        }
        Span::styled(text, Style::default().fg(color))
    }

    fn game_line(&self, game: &Game, suffix: Option<String>) -> Line<'static> {
        let mut spans = vec![Span::styled(
            game.title.clone(),
            Style::default()
                .fg(self.theme.primary_fg)
                .add_modifier(Modifier::BOLD),
        )];
        if let Some(genre) = &game.genre {
            spans.push(Span::styled(
                format!(" · {genre}"),
                Style::default().fg(self.theme.muted),
            ));
        }
        if let Some(suffix) = suffix {
            spans.push(Span::styled(suffix, Style::default().fg(self.theme.accent)));
        }
        spans.push(self.feedback_badge(&game.game_id));
        Line::from(spans)
    }

    fn draw_home(&mut self, frame: &mut Frame, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(area);

        let genre = self.query.genre.as_deref().unwrap_or("All genres");
        let title = format!(
            "Catalog · {genre} · {} ({})",
            self.query.sort.label(),
            self.filtered.len()
        );
        match &self.catalog_state {
            Panel::Loading => render_message(frame, columns[0], &title, "Loading catalog…"),
            Panel::Failed(message) => render_message(
                frame,
                columns[0],
                &title,
                &format!("{message}\n\nCtrl-r to retry"),
            ),
            Panel::Ready(()) if self.filtered.is_empty() => {
                render_message(frame, columns[0], &title, "No games match")
            }
            Panel::Ready(()) => {
                let rows = self
                    .filtered
                    .iter()
                    .map(|game| self.game_line(game, None))
                    .collect();
                render_list(frame, columns[0], &title, rows, &mut self.home_list, &self.theme);
            }
        }

        let selected = self.filtered.get(self.home_list.cursor);
        let mut lines = match selected {
            Some(game) => self.game_summary(game),
            None => vec![Line::from("Select a game")],
        };
        lines.push(Line::from(""));
        lines.push(help_line(&[
            ("/", "search"),
            ("g", "genre"),
            ("s", "sort"),
            ("Enter", "details"),
        ]));
        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Game"))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, columns[1]);
    }

    fn game_summary(&self, game: &Game) -> Vec<Line<'static>> {
        let mut lines = vec![Line::from(Span::styled(
            game.title.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        ))];
        if let Some(genre) = &game.genre {
            lines.push(Line::from(Span::styled(
                genre.clone(),
                Style::default().fg(self.theme.muted),
            )));
        }
        if let Some(date) = game.release_date {
            lines.push(Line::from(format!("Released: {}", date.format("%d %b %Y"))));
        }
        lines.push(Line::from(vec![
            Span::raw("Your rating:"),
            self.feedback_badge(&game.game_id),
        ]));
        if let Some(explanation) = &game.explanation {
            lines.push(Line::from(Span::styled(
                explanation.clone(),
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::ITALIC),
            )));
        }
        if let Some(description) = &game.description {
            lines.push(Line::from(""));
            lines.push(Line::from(description.clone()));
        }
        lines
    }

    fn draw_recommendations(&mut self, frame: &mut Frame, area: Rect) {
        let title = if self.session.is_authenticated() {
            "Recommended for you"
        } else {
            "Recommended from your survey"
        };
        match &self.recs {
            RecsState::Idle | RecsState::Loading => {
                render_message(frame, area, title, "Finding games you might like…")
            }
            RecsState::Done(RecommendationResult::ColdStart) => render_message(
                frame,
                area,
                title,
                "We need a little more to go on.\n\nPress t to take the preferences survey.",
            ),
            RecsState::Done(RecommendationResult::Empty) => render_message(
                frame,
                area,
                title,
                "No recommendations matched.\n\nPress t to adjust your preferences.",
            ),
            RecsState::Done(RecommendationResult::Error(err)) => render_message(
                frame,
                area,
                title,
                &format!("{}\n\nCtrl-r to retry", err.user_message()),
            ),
            RecsState::Done(RecommendationResult::Ready(games)) => {
                let columns = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                    .split(area);
                let rows = games
                    .iter()
                    .map(|scored| {
                        self.game_line(&scored.game, Some(format!(" {}%", scored.match_percent())))
                    })
                    .collect();
                let selected = games.get(self.recs_list.cursor).cloned();
                render_list(frame, columns[0], title, rows, &mut self.recs_list, &self.theme);

                let mut lines = match &selected {
                    Some(scored) => {
                        let mut lines = self.game_summary(&scored.game);
                        lines.insert(
                            1,
                            Line::from(format!("Match: {}%", scored.match_percent())),
                        );
                        lines
                    }
                    None => vec![Line::from("Nothing selected")],
                };
                lines.push(Line::from(""));
                lines.push(help_line(&[
                    ("+", "like"),
                    ("-", "dislike"),
                    ("Enter", "details"),
                    ("t", "survey"),
                ]));
                let paragraph = Paragraph::new(lines)
                    .block(Block::default().borders(Borders::ALL).title("Why this game"))
                    .wrap(Wrap { trim: true });
                frame.render_widget(paragraph, columns[1]);
            }
        }
    }

    fn draw_survey(&mut self, frame: &mut Frame, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(5), Constraint::Length(4)])
            .split(area);
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(40),
                Constraint::Percentage(30),
                Constraint::Percentage(30),
            ])
            .split(rows[0]);

        for (index, category) in Category::ALL.iter().copied().enumerate() {
            let focused = index == self.survey.section;
            let items: Vec<ListItem> = category
                .options()
                .iter()
                .enumerate()
                .map(|(row, option)| {
                    let checked = self.survey.form.is_selected(category, option);
                    let marker = if checked { "[x] " } else { "[ ] " };
                    let mut style = Style::default().fg(self.theme.primary_fg);
                    if checked {
                        style = style.fg(self.theme.success);
                    }
                    if focused && row == self.survey.cursors[index] {
                        style = style.bg(self.theme.selection_bg).add_modifier(Modifier::BOLD);
                    }
                    ListItem::new(Line::from(Span::styled(format!("{marker}{option}"), style)))
                })
                .collect();
            let title = format!(
                "{} ({})",
                category.title(),
                self.survey.form.count(category)
            );
            let border = if focused {
                Style::default().fg(self.theme.accent)
            } else {
                Style::default().fg(self.theme.muted)
            };
            let list = List::new(items).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(border)
                    .title(title),
            );
            frame.render_widget(list, columns[index]);
        }

        let mut lines = Vec::new();
        if self.survey.busy {
            lines.push(Line::from("Submitting…"));
        } else if let Some(error) = &self.survey.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(self.theme.danger),
            )));
        } else {
            lines.push(Line::from("Pick at least one genre."));
        }
        lines.push(help_line(&[
            ("Tab", "section"),
            ("Space", "toggle"),
            ("Enter", "submit"),
            ("Esc", "back"),
        ]));
        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Preferences"))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, rows[1]);
    }

    fn draw_detail(&mut self, frame: &mut Frame, area: Rect) {
        let Some(state) = self.detail.as_ref() else {
            render_message(frame, area, "Game", "Nothing selected");
            return;
        };
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(area);

        let mut lines = match &state.detail {
            Panel::Loading => vec![Line::from("Loading details…")],
            Panel::Failed(message) => vec![Line::from(Span::styled(
                message.clone(),
                Style::default().fg(self.theme.danger),
            ))],
            Panel::Ready(detail) => {
                let mut lines = self.game_summary(&detail.game);
                let mut credits = Vec::new();
                if let Some(developer) = detail.developer() {
                    credits.push(format!("Developer: {developer}"));
                }
                if let Some(publisher) = detail.publisher() {
                    credits.push(format!("Publisher: {publisher}"));
                }
                let platforms = detail.platforms();
                if !platforms.is_empty() {
                    credits.push(format!("Platforms: {}", platforms.join(", ")));
                }
                for (offset, credit) in credits.into_iter().enumerate() {
                    lines.insert(2 + offset, Line::from(credit));
                }
                lines
            }
        };
        lines.push(Line::from(""));
        let library_line = match &state.library {
            None => Line::from(Span::styled(
                "Log in to track this game",
                Style::default().fg(self.theme.muted),
            )),
            Some(Panel::Loading) => Line::from("Library: …"),
            Some(Panel::Failed(message)) => Line::from(Span::styled(
                format!("Library: {message}"),
                Style::default().fg(self.theme.warning),
            )),
            Some(Panel::Ready(())) => {
                let mut text = format!("Library: {}", self.library.status_of(&state.game_id));
                if self.library.is_pending(&state.game_id) {
                    text.push('…');
                }
                Line::from(text)
            }
        };
        lines.push(library_line);
        lines.push(help_line(&[
            ("+", "like"),
            ("-", "dislike"),
            ("l", "library"),
            ("Esc", "back"),
        ]));
        let paragraph = Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(state.title.clone()),
            )
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, columns[0]);

        let rows: Vec<Line<'static>> = match &state.similar {
            Panel::Loading => {
                render_message(frame, columns[1], "Similar games", "Loading…");
                return;
            }
            Panel::Failed(message) => {
                render_message(frame, columns[1], "Similar games", message);
                return;
            }
            Panel::Ready(games) if games.is_empty() => {
                render_message(frame, columns[1], "Similar games", "No similar games found");
                return;
            }
            Panel::Ready(games) => games
                .iter()
                .map(|scored| {
                    self.game_line(&scored.game, Some(format!(" {}%", scored.match_percent())))
                })
                .collect(),
        };
        if let Some(state) = self.detail.as_mut() {
            render_list(
                frame,
                columns[1],
                "Similar games",
                rows,
                &mut state.list,
                &self.theme,
            );
        }
    }

    fn draw_library(&mut self, frame: &mut Frame, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(3)])
            .split(area);
        let titles: Vec<Line> = LibraryTab::ALL
            .iter()
            .map(|tab| Line::from(format!("{} ({})", tab.label(), self.library.count(*tab))))
            .collect();
        let tabs = Tabs::new(titles)
            .select(self.library_tab)
            .block(Block::default().borders(Borders::ALL).title("Library"))
            .highlight_style(
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            );
        frame.render_widget(tabs, rows[0]);

        let title = "Tab: filter · l: change status · Enter: details";
        match &self.library_state {
            Panel::Loading => render_message(frame, rows[1], title, "Loading library…"),
            Panel::Failed(message) => render_message(frame, rows[1], title, message),
            Panel::Ready(()) => {
                let entries = self.visible_library();
                if entries.is_empty() {
                    render_message(frame, rows[1], title, "Nothing here yet");
                    return;
                }
                let lines: Vec<Line<'static>> = entries
                    .iter()
                    .map(|entry| {
                        let mut spans = vec![
                            Span::styled(
                                super::entry_title(entry),
                                Style::default()
                                    .fg(self.theme.primary_fg)
                                    .add_modifier(Modifier::BOLD),
                            ),
                            Span::styled(
                                format!(" · {}", entry.status),
                                Style::default().fg(self.theme.accent),
                            ),
                        ];
                        if let Some(date) = &entry.date {
                            spans.push(Span::styled(
                                format!(" · {date}"),
                                Style::default().fg(self.theme.muted),
                            ));
                        }
                        if self.library.is_pending(&entry.game_id) {
                            spans.push(Span::raw(" …"));
                        }
                        Line::from(spans)
                    })
                    .collect();
                render_list(frame, rows[1], title, lines, &mut self.library_list, &self.theme);
            }
        }
    }

    fn draw_history(&mut self, frame: &mut Frame, area: Rect) {
        let title = format!("Rated games ({}) · +/- re-rate · x remove", self.history.len());
        match &self.history_state {
            Panel::Loading => render_message(frame, area, &title, "Loading history…"),
            Panel::Failed(message) => render_message(frame, area, &title, message),
            Panel::Ready(()) if self.history.is_empty() => render_message(
                frame,
                area,
                &title,
                "You have not rated anything yet",
            ),
            Panel::Ready(()) => {
                let rows = self
                    .history
                    .games()
                    .iter()
                    .map(|game| self.game_line(game, None))
                    .collect();
                render_list(frame, area, &title, rows, &mut self.history_list, &self.theme);
            }
        }
    }

    fn draw_profile(&mut self, frame: &mut Frame, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(area);

        let mut lines = match &self.profile.preferences {
            Panel::Loading => vec![Line::from("Loading preferences…")],
            Panel::Failed(message) => vec![Line::from(message.clone())],
            Panel::Ready(preferences) => {
                let join = |items: &[String]| {
                    if items.is_empty() {
                        "none".to_string()
                    } else {
                        items.join(", ")
                    }
                };
                vec![
                    Line::from(format!("Genres: {}", join(&preferences.genres))),
                    Line::from(format!("Platforms: {}", join(&preferences.platforms))),
                    Line::from(format!("Modes: {}", join(&preferences.modes))),
                ]
            }
        };
        lines.push(Line::from(""));
        lines.push(help_line(&[("e", "edit"), ("R", "reset profile")]));
        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Preferences"))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, columns[0]);

        let block = Block::default().borders(Borders::ALL).title("Taste profile");
        let stats = match &self.profile.stats {
            Panel::Loading => {
                frame.render_widget(Paragraph::new("Loading stats…").block(block), columns[1]);
                return;
            }
            Panel::Failed(message) => {
                frame.render_widget(Paragraph::new(message.clone()).block(block), columns[1]);
                return;
            }
            Panel::Ready(stats) => stats,
        };
        let inner = block.inner(columns[1]);
        frame.render_widget(block, columns[1]);

        let mut constraints = vec![Constraint::Length(2)];
        constraints.extend(stats.genre_data.iter().map(|_| Constraint::Length(1)));
        constraints.push(Constraint::Min(0));
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(inner);

        frame.render_widget(
            Paragraph::new(format!("Recommendation accuracy: {}%", accuracy_percent(stats))),
            rows[0],
        );
        for (index, stat) in stats.genre_data.iter().enumerate() {
            let gauge = Gauge::default()
                .gauge_style(Style::default().fg(self.theme.accent))
                .ratio(bar_fraction(stat))
                .label(format!("{} {:.0}/{BAR_SCALE:.0}", stat.name, stat.value));
            frame.render_widget(gauge, rows[index + 1]);
        }
        if stats.genre_data.is_empty() {
            frame.render_widget(
                Paragraph::new("Rate a few games to see your genre breakdown"),
                rows[1],
            );
        }
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Status");
        let primary = if self.mode == Mode::Search {
            format!("Search: {}", self.query.search)
        } else {
            self.status.clone()
        };
        let pending = self.feedback.pending_count();
        let mut line = vec![Span::raw(primary)];
        if pending > 0 {
            line.push(Span::styled(
                format!("  ({pending} saving)"),
                Style::default().fg(self.theme.warning),
            ));
        }
        let paragraph = Paragraph::new(Line::from(line))
            .block(block)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn render_account(&self, frame: &mut Frame) {
        let Some(Overlay::Account(form)) = &self.overlay else {
            return;
        };
        let area = centered_rect(50, 11, frame.size());
        frame.render_widget(Clear, area);

        let mut lines = Vec::new();
        if let Some(reason) = &form.reason {
            lines.push(Line::from(Span::styled(
                reason.clone(),
                Style::default().fg(self.theme.accent),
            )));
        }
        let field_style = |field: AccountField| {
            if form.focus == field {
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(self.theme.primary_fg)
            }
        };
        lines.push(Line::from(vec![
            Span::styled("Username: ", field_style(AccountField::Username)),
            Span::raw(form.username.clone()),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Password: ", field_style(AccountField::Password)),
            Span::raw("•".repeat(form.password.chars().count())),
        ]));
        lines.push(Line::from(""));
        if form.busy {
            lines.push(Line::from("Contacting server…"));
        } else if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(self.theme.danger),
            )));
        }
        lines.push(help_line(&[
            ("Enter", form.mode.label()),
            ("Tab", "field"),
            ("Ctrl-t", form.mode.toggled().label()),
            ("Esc", "cancel"),
        ]));

        let paragraph = Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(form.mode.label()),
            )
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);

        let offset = if form.reason.is_some() { 2 } else { 1 };
        let (row, len) = match form.focus {
            AccountField::Username => (0, form.username.chars().count()),
            AccountField::Password => (1, form.password.chars().count()),
        };
        let cursor_x =
            (area.x + 11 + len as u16).min(area.x + area.width.saturating_sub(2));
        frame.set_cursor(cursor_x, area.y + offset + row);
    }

    fn render_confirm(&self, frame: &mut Frame, confirm: &Confirm) {
        let area = centered_rect(48, 6, frame.size());
        frame.render_widget(Clear, area);
        let question = match confirm {
            Confirm::RemoveRating { title, .. } => format!("Remove your rating for {title}?"),
            Confirm::ResetProfile => {
                "Reset your profile? Ratings and preferences will be cleared.".to_string()
            }
        };
        let paragraph = Paragraph::new(vec![
            Line::from(question),
            Line::from(""),
            help_line(&[("y", "confirm"), ("n", "cancel")]),
        ])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(self.theme.warning))
                .title("Confirm"),
        )
        .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn render_chooser(&self, frame: &mut Frame) {
        let Some(Overlay::Chooser(chooser)) = &self.overlay else {
            return;
        };
        let height = chooser.options.len() as u16 + 2;
        let area = centered_rect(40, height, frame.size());
        frame.render_widget(Clear, area);

        let current = self.library.status_of(&chooser.game_id);
        let items: Vec<ListItem> = chooser
            .options
            .iter()
            .map(|choice| {
                let mut label = choice.label().to_string();
                if *choice == LibraryChoice::Set(current) {
                    label.push_str(" (current)");
                }
                ListItem::new(label)
            })
            .collect();
        let mut list_state = ListState::default();
        list_state.select(Some(chooser.cursor));
        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(chooser.title.clone()),
            )
            .highlight_symbol("▶ ")
            .highlight_style(
                Style::default()
                    .bg(self.theme.accent)
                    .fg(self.theme.on_accent),
            );
        frame.render_stateful_widget(list, area, &mut list_state);
    }
}

fn render_list(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    rows: Vec<Line<'static>>,
    cursor: &mut ListCursor,
    theme: &Theme,
) {
    let height = area.height.saturating_sub(2) as usize;
    let window = cursor.window(rows.len(), height);
    let start = window.start;
    let items: Vec<ListItem> = rows
        .into_iter()
        .enumerate()
        .skip(window.start)
        .take(window.len())
        .map(|(idx, row)| {
            let marker = if idx == cursor.cursor {
                Span::styled(
                    "▶ ",
                    Style::default()
                        .fg(theme.accent)
                        .add_modifier(Modifier::BOLD),
                )
            } else {
                Span::raw("  ")
            };
            let mut spans = vec![marker];
            spans.extend(row.spans);
            ListItem::new(Line::from(spans))
        })
        .collect();

    let mut list_state = ListState::default();
    if !items.is_empty() {
        list_state.select(Some(cursor.cursor.saturating_sub(start)));
    }
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title.to_string()))
        .highlight_style(Style::default().bg(theme.selection_bg));
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn render_message(frame: &mut Frame, area: Rect, title: &str, message: &str) {
    let paragraph = Paragraph::new(message.to_string())
        .block(Block::default().borders(Borders::ALL).title(title.to_string()))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn help_line(keys: &[(&str, &str)]) -> Line<'static> {
    let mut spans = Vec::new();
    for (key, action) in keys {
        spans.push(Span::styled(
            key.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::raw(format!(" {action}  ")));
    }
    Line::from(spans)
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_rect_fits_inside_small_areas() {
        let area = Rect::new(0, 0, 30, 8);
        assert_eq!(centered_rect(50, 11, area), Rect::new(0, 0, 30, 8));
        assert_eq!(centered_rect(10, 4, area), Rect::new(10, 2, 10, 4));
    }

    #[test]
    fn help_line_bolds_keys() {
        let line = help_line(&[("y", "confirm")]);
        assert_eq!(line.spans.len(), 2);
        assert_eq!(line.spans[0].content, "y");
        assert_eq!(line.spans[1].content, " confirm  ");
    }
}
