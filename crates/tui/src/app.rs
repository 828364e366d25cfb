mod draw;
mod theme;

use std::{future::Future, io, sync::Arc, thread, time::Duration};

use anyhow::{Context, Result};
use chrono::Local;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use gamerec_core::{
    api::{AuthMode, RecommendRequest, RecommenderApi},
    catalog::{CatalogLoader, CatalogQuery},
    config::AppConfig,
    detail::{load_detail, DetailData},
    error::ApiResult,
    feedback::{
        FeedbackBook, FeedbackReconciler, FeedbackResolution, Gesture, GestureOutcome, Mutation,
    },
    history::HistoryView,
    library::{
        LibraryChoice, LibraryOutcome, LibraryReconciler, LibraryResolution, LibraryTab,
        LibraryView,
    },
    models::{Game, GameDetail, GameId, LibraryEntry, SurveyPreferences, UserId, UserStats},
    profile::{self, ProfileData},
    reconcile::Resolution,
    recommend::{request_recommendations, RecommendationResult, ScoredGame},
    session::{self, AuthError, Session},
    survey::{self, Category, SurveyError, SurveyForm, SurveyOutcome, GENRES},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::{spawn, sync::mpsc, task::JoinHandle};
use tracing::{debug, error, info, warn};

use self::theme::Theme;

const TICK_RATE: Duration = Duration::from_millis(250);
const MAX_FIELD_LEN: usize = 64;

/// Identifies one screen load; results carrying an older ticket are stale.
type Ticket = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Browse,
    Search,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Home,
    Recommendations,
    Survey,
    Detail,
    Library,
    History,
    Profile,
}

impl Screen {
    const NAV: [Screen; 6] = [
        Screen::Home,
        Screen::Recommendations,
        Screen::Library,
        Screen::History,
        Screen::Profile,
        Screen::Survey,
    ];

    fn title(self) -> &'static str {
        match self {
            Screen::Home => "Catalog",
            Screen::Recommendations => "For You",
            Screen::Survey => "Survey",
            Screen::Detail => "Game",
            Screen::Library => "Library",
            Screen::History => "History",
            Screen::Profile => "Profile",
        }
    }

    fn requires_login(self) -> bool {
        matches!(self, Screen::Library | Screen::History | Screen::Profile)
    }
}

/// Panel that loads independently of its neighbours.
#[derive(Debug, Clone)]
enum Panel<T> {
    Loading,
    Ready(T),
    Failed(String),
}

impl<T> Panel<T> {
    fn from_result(result: ApiResult<T>) -> Self {
        match result {
            Ok(value) => Panel::Ready(value),
            Err(err) => Panel::Failed(err.user_message()),
        }
    }

    fn ready(&self) -> Option<&T> {
        match self {
            Panel::Ready(value) => Some(value),
            _ => None,
        }
    }
}

/// Action put on hold behind the login prompt and replayed after success.
#[derive(Debug, Clone)]
enum Deferred {
    Feedback(GameId, Gesture),
    Library(GameId, LibraryChoice),
    Open(Screen),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccountField {
    Username,
    Password,
}

#[derive(Debug, Clone)]
struct AccountForm {
    mode: AuthMode,
    username: String,
    password: String,
    focus: AccountField,
    reason: Option<String>,
    error: Option<String>,
    busy: bool,
    deferred: Option<Deferred>,
}

impl AccountForm {
    fn new(reason: Option<String>, deferred: Option<Deferred>) -> Self {
        Self {
            mode: AuthMode::Login,
            username: String::new(),
            password: String::new(),
            focus: AccountField::Username,
            reason,
            error: None,
            busy: false,
            deferred,
        }
    }

    fn field_mut(&mut self) -> &mut String {
        match self.focus {
            AccountField::Username => &mut self.username,
            AccountField::Password => &mut self.password,
        }
    }

    fn next_field(&mut self) {
        self.focus = match self.focus {
            AccountField::Username => AccountField::Password,
            AccountField::Password => AccountField::Username,
        };
    }
}

#[derive(Debug, Clone)]
enum Confirm {
    RemoveRating { game_id: GameId, title: String },
    ResetProfile,
}

#[derive(Debug, Clone)]
struct StatusChooser {
    game_id: GameId,
    title: String,
    options: Vec<LibraryChoice>,
    cursor: usize,
}

enum Overlay {
    Account(AccountForm),
    Confirm(Confirm),
    Chooser(StatusChooser),
}

/// Where a submitted survey came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SurveyOrigin {
    Onboarding,
    Profile,
}

struct SurveyState {
    form: SurveyForm,
    section: usize,
    cursors: [usize; 3],
    origin: SurveyOrigin,
    error: Option<String>,
    busy: bool,
}

impl SurveyState {
    fn new(form: SurveyForm, origin: SurveyOrigin) -> Self {
        Self {
            form,
            section: 0,
            cursors: [0; 3],
            origin,
            error: None,
            busy: false,
        }
    }

    fn category(&self) -> Category {
        Category::ALL[self.section]
    }

    fn move_section(&mut self, delta: isize) {
        let len = Category::ALL.len() as isize;
        self.section = (self.section as isize + delta).rem_euclid(len) as usize;
    }

    fn move_cursor(&mut self, delta: isize) {
        let options = self.category().options().len();
        let cursor = &mut self.cursors[self.section];
        *cursor = (*cursor as isize + delta).clamp(0, options as isize - 1) as usize;
    }

    fn toggle_current(&mut self) {
        let category = self.category();
        if let Some(item) = category.options().get(self.cursors[self.section]) {
            self.form.toggle(category, item);
            self.error = None;
        }
    }
}

enum RecsState {
    Idle,
    Loading,
    Done(RecommendationResult),
}

struct DetailState {
    game_id: GameId,
    title: String,
    detail: Panel<GameDetail>,
    similar: Panel<Vec<ScoredGame>>,
    // `None` for guests, who have no library.
    library: Option<Panel<()>>,
    list: ListCursor,
}

struct ProfileState {
    preferences: Panel<SurveyPreferences>,
    stats: Panel<UserStats>,
}

/// A successful login together with the user's rated games, so the
/// feedback book starts from server state.
#[derive(Debug)]
struct SignedIn {
    user: UserId,
    rated: ApiResult<Vec<Game>>,
}

enum AppEvent {
    Input(Event),
    Tick,
    CatalogLoaded(Ticket, ApiResult<Vec<Game>>),
    RecommendationsLoaded(Ticket, RecommendationResult),
    DetailLoaded(Ticket, DetailData),
    LibraryLoaded(Ticket, ApiResult<Vec<LibraryEntry>>),
    HistoryLoaded(Ticket, ApiResult<Vec<Game>>),
    ProfileLoaded(Ticket, ProfileData),
    Authenticated(Result<SignedIn, AuthError>),
    SurveySubmitted(Result<SurveyOutcome, SurveyError>),
    FeedbackSettled(FeedbackResolution),
    LibrarySettled(LibraryResolution),
    ProfileReset(ApiResult<()>),
}

/// Top-level state for the GameRec terminal client.
pub struct GameRecApp {
    api: Arc<dyn RecommenderApi>,
    catalog: CatalogLoader,
    feedback_reconciler: FeedbackReconciler,
    library_reconciler: LibraryReconciler,
    session: Session,
    screen: Screen,
    detail_return: Screen,
    mode: Mode,
    overlay: Option<Overlay>,
    status: String,
    should_quit: bool,
    event_tx: Option<mpsc::Sender<AppEvent>>,
    ticket: Ticket,
    load_task: Option<JoinHandle<()>>,
    // Session-wide mutation state shared by every screen.
    feedback: FeedbackBook,
    library: LibraryView,
    games: Vec<Game>,
    filtered: Vec<Game>,
    query: CatalogQuery,
    catalog_state: Panel<()>,
    home_list: ListCursor,
    recs: RecsState,
    recs_list: ListCursor,
    guest_request: Option<RecommendRequest>,
    survey: SurveyState,
    detail: Option<DetailState>,
    library_tab: usize,
    library_list: ListCursor,
    library_state: Panel<()>,
    history: HistoryView,
    history_list: ListCursor,
    history_state: Panel<()>,
    profile: ProfileState,
    theme: Theme,
    theme_status: Option<String>,
}

impl GameRecApp {
    pub fn new(api: Arc<dyn RecommenderApi>, config: &AppConfig) -> Self {
        let (theme, theme_status) = Theme::from_config(&config.theme);
        let timeout = config.request_timeout();
        Self {
            catalog: CatalogLoader::new(api.clone()),
            feedback_reconciler: FeedbackReconciler::new(api.clone(), timeout),
            library_reconciler: LibraryReconciler::new(api.clone(), timeout),
            api,
            session: Session::guest(),
            screen: Screen::Home,
            detail_return: Screen::Home,
            mode: Mode::Browse,
            overlay: None,
            status: "Ready".to_string(),
            should_quit: false,
            event_tx: None,
            ticket: 0,
            load_task: None,
            feedback: FeedbackBook::new(),
            library: LibraryView::new(),
            games: Vec::new(),
            filtered: Vec::new(),
            query: CatalogQuery::default(),
            catalog_state: Panel::Loading,
            home_list: ListCursor::default(),
            recs: RecsState::Idle,
            recs_list: ListCursor::default(),
            guest_request: None,
            survey: SurveyState::new(SurveyForm::new(), SurveyOrigin::Onboarding),
            detail: None,
            library_tab: 0,
            library_list: ListCursor::default(),
            library_state: Panel::Loading,
            history: HistoryView::new(),
            history_list: ListCursor::default(),
            history_state: Panel::Loading,
            profile: ProfileState {
                preferences: Panel::Loading,
                stats: Panel::Loading,
            },
            theme,
            theme_status: Some(theme_status),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(128);
        spawn_input_thread(event_tx.clone());
        self.event_tx = Some(event_tx);

        let mut status = "Loading catalog…".to_string();
        if let Some(note) = self.theme_status.take() {
            status.push_str(" • ");
            status.push_str(&note);
        }
        self.set_status(status);
        self.open(Screen::Home);

        loop {
            terminal.draw(|frame| self.draw(frame))?;
            if self.should_quit {
                break;
            }
            let maybe_event = event_rx.recv().await;
            if !self.process_app_event(maybe_event) {
                break;
            }
            if self.should_quit {
                break;
            }
        }

        if let Some(handle) = self.load_task.take() {
            handle.abort();
        }
        restore_terminal(&mut terminal)?;
        self.event_tx = None;
        Ok(())
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
    }

    fn user(&self) -> Option<UserId> {
        self.session.user().cloned()
    }

    fn is_current(&self, ticket: Ticket) -> bool {
        if ticket == self.ticket {
            true
        } else {
            debug!(ticket, current = self.ticket, "discarding stale load");
            false
        }
    }

    /// Spawn `future` and post its event back to the loop.
    fn spawn_event<F>(&mut self, future: F) -> Option<JoinHandle<()>>
    where
        F: Future<Output = AppEvent> + Send + 'static,
    {
        let Some(sender) = self.event_tx.clone() else {
            self.set_status("Internal error: event channel unavailable");
            error!("event_channel_missing");
            return None;
        };
        Some(spawn(async move {
            let event = future.await;
            let _ = sender.send(event).await;
        }))
    }

    /// Start a screen load, abandoning whichever load was running.
    fn start_load<F>(&mut self, make: impl FnOnce(Ticket) -> F)
    where
        F: Future<Output = AppEvent> + Send + 'static,
    {
        if let Some(handle) = self.load_task.take() {
            handle.abort();
        }
        self.ticket += 1;
        let future = make(self.ticket);
        self.load_task = self.spawn_event(future);
    }

    fn process_app_event(&mut self, maybe_event: Option<AppEvent>) -> bool {
        match maybe_event {
            Some(AppEvent::Input(event)) => {
                if let Err(err) = self.handle_input(event) {
                    self.set_status(format!("Error: {err}"));
                }
            }
            Some(AppEvent::Tick) => {}
            Some(AppEvent::CatalogLoaded(ticket, result)) => {
                if self.is_current(ticket) {
                    self.on_catalog_loaded(result);
                }
            }
            Some(AppEvent::RecommendationsLoaded(ticket, result)) => {
                if self.is_current(ticket) {
                    self.on_recommendations_loaded(result);
                }
            }
            Some(AppEvent::DetailLoaded(ticket, data)) => {
                if self.is_current(ticket) {
                    self.on_detail_loaded(data);
                }
            }
            Some(AppEvent::LibraryLoaded(ticket, result)) => {
                if self.is_current(ticket) {
                    self.on_library_loaded(result);
                }
            }
            Some(AppEvent::HistoryLoaded(ticket, result)) => {
                if self.is_current(ticket) {
                    self.on_history_loaded(result);
                }
            }
            Some(AppEvent::ProfileLoaded(ticket, data)) => {
                if self.is_current(ticket) {
                    self.profile = ProfileState {
                        preferences: Panel::from_result(data.preferences),
                        stats: Panel::from_result(data.stats),
                    };
                }
            }
            Some(AppEvent::Authenticated(result)) => self.on_authenticated(result),
            Some(AppEvent::SurveySubmitted(result)) => self.on_survey_submitted(result),
            Some(AppEvent::FeedbackSettled(resolution)) => self.on_feedback_settled(resolution),
            Some(AppEvent::LibrarySettled(resolution)) => self.on_library_settled(resolution),
            Some(AppEvent::ProfileReset(result)) => self.on_profile_reset(result),
            None => return false,
        }
        true
    }

    // Navigation ------------------------------------------------------------

    fn open(&mut self, screen: Screen) {
        if screen.requires_login() && !self.session.is_authenticated() {
            self.prompt_login(
                format!("Log in to see your {}", screen.title().to_lowercase()),
                Some(Deferred::Open(screen)),
            );
            return;
        }
        self.mode = Mode::Browse;
        self.screen = screen;
        info!(screen = screen.title(), "navigate");
        match screen {
            Screen::Home => self.load_catalog(),
            Screen::Recommendations => self.load_recommendations(),
            Screen::Survey => self.begin_survey(SurveyForm::new(), SurveyOrigin::Onboarding),
            Screen::Library => self.load_library(),
            Screen::History => self.load_history(),
            Screen::Profile => self.load_profile(),
            Screen::Detail => self.reload_detail(),
        }
    }

    fn load_catalog(&mut self) {
        self.catalog_state = Panel::Loading;
        let catalog = self.catalog.clone();
        self.start_load(|ticket| async move {
            AppEvent::CatalogLoaded(ticket, catalog.games().await)
        });
    }

    fn on_catalog_loaded(&mut self, result: ApiResult<Vec<Game>>) {
        match result {
            Ok(games) => {
                info!(total = games.len(), "catalog ready");
                self.games = games;
                self.apply_query();
                self.catalog_state = Panel::Ready(());
                self.set_status(format!(
                    "Loaded {} games at {}",
                    self.games.len(),
                    Local::now().format("%H:%M")
                ));
            }
            Err(err) => {
                warn!(%err, "catalog load failed");
                self.set_status(format!("Catalog unavailable: {}", err.user_message()));
                self.catalog_state = Panel::Failed(err.user_message());
            }
        }
    }

    fn apply_query(&mut self) {
        self.filtered = self.query.apply(&self.games);
        self.home_list.reset();
    }

    fn load_recommendations(&mut self) {
        let request = match self.user() {
            Some(user_id) => RecommendRequest::User { user_id },
            None => match self.guest_request.clone() {
                Some(request) => request,
                None => {
                    self.begin_survey(SurveyForm::new(), SurveyOrigin::Onboarding);
                    self.set_status("Pick a few genres to get guest recommendations");
                    return;
                }
            },
        };
        self.recs = RecsState::Loading;
        self.recs_list.reset();
        let api = self.api.clone();
        self.start_load(|ticket| async move {
            let result = request_recommendations(api.as_ref(), &request).await;
            AppEvent::RecommendationsLoaded(ticket, result)
        });
    }

    fn on_recommendations_loaded(&mut self, result: RecommendationResult) {
        match &result {
            RecommendationResult::Ready(games) => {
                self.feedback.track(games.iter().map(|scored| &scored.game));
                self.set_status(format!("{} recommendations", games.len()));
            }
            RecommendationResult::ColdStart => {
                self.set_status("Not enough ratings yet. Press t to take the survey")
            }
            RecommendationResult::Empty => self.set_status("No matches. Try adjusting your survey"),
            RecommendationResult::Error(err) => {
                self.set_status(format!("Recommendations failed: {}", err.user_message()))
            }
        }
        self.recs = RecsState::Done(result);
    }

    fn begin_survey(&mut self, form: SurveyForm, origin: SurveyOrigin) {
        if let Some(handle) = self.load_task.take() {
            handle.abort();
        }
        self.mode = Mode::Browse;
        self.screen = Screen::Survey;
        self.survey = SurveyState::new(form, origin);
    }

    fn open_detail(&mut self, game_id: GameId, title: String) {
        if self.screen != Screen::Detail {
            self.detail_return = self.screen;
        }
        self.screen = Screen::Detail;
        self.mode = Mode::Browse;
        self.detail = Some(DetailState {
            game_id,
            title,
            detail: Panel::Loading,
            similar: Panel::Loading,
            library: self.session.is_authenticated().then_some(Panel::Loading),
            list: ListCursor::default(),
        });
        self.reload_detail();
    }

    fn reload_detail(&mut self) {
        let Some(detail) = self.detail.as_ref() else {
            self.screen = Screen::Home;
            return;
        };
        let game_id = detail.game_id.clone();
        let user = self.user();
        let api = self.api.clone();
        self.start_load(|ticket| async move {
            let data = load_detail(api.as_ref(), user.as_ref(), &game_id).await;
            AppEvent::DetailLoaded(ticket, data)
        });
    }

    fn on_detail_loaded(&mut self, data: DetailData) {
        let Some(state) = self.detail.as_mut() else {
            return;
        };
        data.seed_feedback(&mut self.feedback);
        if let Ok(detail) = &data.detail {
            state.title = detail.game.title.clone();
        }
        state.library = match data.library {
            None => None,
            Some(Ok(entries)) => {
                self.library.load(entries);
                Some(Panel::Ready(()))
            }
            Some(Err(err)) => Some(Panel::Failed(err.user_message())),
        };
        state.detail = Panel::from_result(data.detail);
        state.similar = Panel::from_result(data.similar);
        state.list.reset();
    }

    fn load_library(&mut self) {
        let Some(user) = self.user() else { return };
        self.library_state = Panel::Loading;
        self.library_list.reset();
        let api = self.api.clone();
        self.start_load(|ticket| async move {
            AppEvent::LibraryLoaded(ticket, api.library(&user).await)
        });
    }

    fn on_library_loaded(&mut self, result: ApiResult<Vec<LibraryEntry>>) {
        match result {
            Ok(entries) => {
                self.library.load(entries);
                self.library_state = Panel::Ready(());
                self.set_status(format!(
                    "{} games in your library",
                    self.library.count(LibraryTab::All)
                ));
            }
            Err(err) => {
                self.set_status(format!("Library unavailable: {}", err.user_message()));
                self.library_state = Panel::Failed(err.user_message());
            }
        }
    }

    fn load_history(&mut self) {
        let Some(user) = self.user() else { return };
        self.history_state = Panel::Loading;
        self.history_list.reset();
        let api = self.api.clone();
        self.start_load(|ticket| async move {
            AppEvent::HistoryLoaded(ticket, api.history(&user).await)
        });
    }

    fn on_history_loaded(&mut self, result: ApiResult<Vec<Game>>) {
        match result {
            Ok(games) => {
                self.history.load(&mut self.feedback, games);
                self.history_state = Panel::Ready(());
                self.set_status(format!("{} rated games", self.history.len()));
            }
            Err(err) => {
                self.set_status(format!("History unavailable: {}", err.user_message()));
                self.history_state = Panel::Failed(err.user_message());
            }
        }
    }

    fn load_profile(&mut self) {
        let Some(user) = self.user() else { return };
        self.profile = ProfileState {
            preferences: Panel::Loading,
            stats: Panel::Loading,
        };
        let api = self.api.clone();
        self.start_load(|ticket| async move {
            AppEvent::ProfileLoaded(ticket, profile::load_profile(api.as_ref(), &user).await)
        });
    }

    // Account ---------------------------------------------------------------

    fn prompt_login(&mut self, reason: impl Into<String>, deferred: Option<Deferred>) {
        let reason = reason.into();
        self.set_status(reason.clone());
        self.overlay = Some(Overlay::Account(AccountForm::new(Some(reason), deferred)));
    }

    fn toggle_account(&mut self) {
        if let Some(user) = self.user() {
            self.session.logout();
            self.feedback = FeedbackBook::new();
            self.library = LibraryView::new();
            self.history = HistoryView::new();
            self.guest_request = None;
            self.set_status(format!("Logged out {user}"));
            self.open(Screen::Home);
        } else {
            self.overlay = Some(Overlay::Account(AccountForm::new(None, None)));
        }
    }

    fn submit_account(&mut self) {
        let Some(Overlay::Account(form)) = self.overlay.as_mut() else {
            return;
        };
        if form.busy {
            return;
        }
        form.busy = true;
        form.error = None;
        let mode = form.mode;
        let username = form.username.clone();
        let password = form.password.clone();
        let api = self.api.clone();
        self.spawn_event(async move {
            let result = match session::authenticate(api.as_ref(), mode, &username, &password).await
            {
                Ok(user) => {
                    let rated = api.history(&user).await;
                    Ok(SignedIn { user, rated })
                }
                Err(err) => Err(err),
            };
            AppEvent::Authenticated(result)
        });
    }

    fn on_authenticated(&mut self, result: Result<SignedIn, AuthError>) {
        let Some(Overlay::Account(form)) = self.overlay.as_mut() else {
            return;
        };
        form.busy = false;
        match result {
            Ok(SignedIn { user, rated }) => {
                let deferred = form.deferred.take();
                self.overlay = None;
                self.session.login(user.clone());
                self.feedback = FeedbackBook::new();
                self.library = LibraryView::new();
                self.history = HistoryView::new();
                match rated {
                    Ok(games) => self.feedback.track(&games),
                    Err(err) => warn!(user = %user, %err, "rated games unavailable after login"),
                }
                self.set_status(format!("Signed in as {user}"));
                let reopened = matches!(deferred, Some(Deferred::Open(_)));
                match deferred {
                    Some(Deferred::Open(screen)) => self.open(screen),
                    Some(Deferred::Feedback(game_id, gesture)) => {
                        self.apply_gesture(game_id, gesture)
                    }
                    Some(Deferred::Library(game_id, choice)) => {
                        self.apply_library_choice(game_id, choice)
                    }
                    None => {}
                }
                if reopened {
                    return;
                }
                match self.screen {
                    Screen::Recommendations => self.load_recommendations(),
                    Screen::Detail => {
                        if let Some(detail) = self.detail.as_mut() {
                            detail.library = Some(Panel::Loading);
                        }
                        self.reload_detail();
                    }
                    _ => {}
                }
            }
            Err(err) => {
                form.error = Some(err.to_string());
            }
        }
    }

    // Feedback --------------------------------------------------------------

    fn apply_gesture(&mut self, game_id: GameId, gesture: Gesture) {
        let user = self.user();
        match self.feedback.gesture(user.as_ref(), &game_id, gesture) {
            GestureOutcome::LoginRequired => self.prompt_login(
                "Log in to rate games",
                Some(Deferred::Feedback(game_id, gesture)),
            ),
            GestureOutcome::Coalesced => {
                self.set_status("Still saving the previous rating for this game")
            }
            GestureOutcome::Submit(mutation) => self.submit_feedback(mutation),
        }
    }

    fn submit_feedback(&mut self, mutation: Mutation) {
        let reconciler = self.feedback_reconciler.clone();
        self.spawn_event(async move { AppEvent::FeedbackSettled(reconciler.run(mutation).await) });
    }

    fn remove_rating(&mut self, game_id: GameId) {
        let user = self.user();
        match self
            .history
            .remove(&mut self.feedback, user.as_ref(), &game_id)
        {
            GestureOutcome::LoginRequired => self.prompt_login("Log in to edit your history", None),
            GestureOutcome::Coalesced => {
                self.set_status("Still saving the previous rating for this game")
            }
            GestureOutcome::Submit(mutation) => {
                self.history_list.clamp(self.history.len());
                self.submit_feedback(mutation);
            }
        }
    }

    fn on_feedback_settled(&mut self, resolution: FeedbackResolution) {
        if self.session.user() != Some(&resolution.mutation().user) {
            debug!("ignoring feedback settlement for a previous session");
            return;
        }
        self.feedback.resolve(&resolution);
        self.history.resolve(&mut self.feedback, &resolution);
        self.history_list.clamp(self.history.len());
        let message = match &resolution {
            Resolution::Confirmed(mutation) => match mutation.rating {
                Some(_) => "Rating saved".to_string(),
                None => "Rating removed".to_string(),
            },
            Resolution::Reconciled { error, .. } => format!(
                "Could not save rating ({}); refreshed from server",
                error.user_message()
            ),
            Resolution::Unresolved { error, .. } => format!(
                "Could not save rating ({}); showing last saved value",
                error.user_message()
            ),
        };
        self.set_status(message);
    }

    // Library ---------------------------------------------------------------

    fn open_chooser(&mut self, game_id: GameId, title: String) {
        let options = LibraryChoice::options(self.library.contains(&game_id));
        let current = self.library.status_of(&game_id);
        let cursor = options
            .iter()
            .position(|choice| *choice == LibraryChoice::Set(current))
            .unwrap_or(0);
        self.overlay = Some(Overlay::Chooser(StatusChooser {
            game_id,
            title,
            options,
            cursor,
        }));
    }

    fn apply_library_choice(&mut self, game_id: GameId, choice: LibraryChoice) {
        let user = self.user();
        match self.library.choose(user.as_ref(), &game_id, choice) {
            LibraryOutcome::LoginRequired => self.prompt_login(
                "Log in to manage your library",
                Some(Deferred::Library(game_id, choice)),
            ),
            LibraryOutcome::Coalesced => {
                self.set_status("Still saving the previous change for this game")
            }
            LibraryOutcome::Unchanged => self.set_status(format!("Already {}", choice.label())),
            LibraryOutcome::Submit(mutation) => {
                self.library_list.clamp(self.visible_library().len());
                let reconciler = self.library_reconciler.clone();
                self.spawn_event(async move {
                    AppEvent::LibrarySettled(reconciler.run(mutation).await)
                });
            }
        }
    }

    fn on_library_settled(&mut self, resolution: LibraryResolution) {
        if self.session.user() != Some(&resolution.mutation().user) {
            debug!("ignoring library settlement for a previous session");
            return;
        }
        self.library.resolve(&resolution);
        self.library_list.clamp(self.visible_library().len());
        let message = match &resolution {
            Resolution::Confirmed(mutation) => match mutation.choice {
                LibraryChoice::Remove => "Removed from library".to_string(),
                LibraryChoice::Set(status) => format!("Library updated: {status}"),
            },
            Resolution::Reconciled { error, .. } => format!(
                "Library change failed ({}); refreshed from server",
                error.user_message()
            ),
            Resolution::Unresolved { error, .. } => format!(
                "Library change failed ({}); showing last saved state",
                error.user_message()
            ),
        };
        self.set_status(message);
    }

    fn library_tab(&self) -> LibraryTab {
        LibraryTab::ALL[self.library_tab]
    }

    fn visible_library(&self) -> Vec<&LibraryEntry> {
        self.library.visible(self.library_tab())
    }

    // Survey & profile -------------------------------------------------------

    fn submit_survey(&mut self) {
        if self.survey.busy {
            return;
        }
        if let Err(err) = self.survey.form.validate() {
            self.survey.error = Some(err.to_string());
            return;
        }
        self.survey.busy = true;
        self.survey.error = None;
        let form = self.survey.form.clone();
        let user = self.user();
        let api = self.api.clone();
        self.spawn_event(async move {
            let result = survey::submit(api.as_ref(), user.as_ref(), &form).await;
            AppEvent::SurveySubmitted(result)
        });
    }

    fn on_survey_submitted(&mut self, result: Result<SurveyOutcome, SurveyError>) {
        self.survey.busy = false;
        match result {
            Ok(request) => {
                if matches!(request, RecommendRequest::Guest(_)) {
                    self.guest_request = Some(request);
                }
                let message = match self.survey.origin {
                    SurveyOrigin::Profile => "Preferences saved",
                    SurveyOrigin::Onboarding => "Survey complete",
                };
                self.set_status(message);
                self.open(Screen::Recommendations);
            }
            Err(err) => {
                self.survey.error = Some(err.to_string());
            }
        }
    }

    fn edit_preferences(&mut self) {
        let form = match self.profile.preferences.ready() {
            Some(preferences) => SurveyForm::from_preferences(preferences),
            None => SurveyForm::new(),
        };
        self.begin_survey(form, SurveyOrigin::Profile);
    }

    fn reset_profile(&mut self) {
        let Some(user) = self.user() else { return };
        let api = self.api.clone();
        self.set_status("Resetting profile…");
        self.spawn_event(async move {
            AppEvent::ProfileReset(profile::reset_profile(api.as_ref(), &user).await)
        });
    }

    fn on_profile_reset(&mut self, result: ApiResult<()>) {
        match result {
            Ok(()) => {
                self.feedback = FeedbackBook::new();
                self.history = HistoryView::new();
                self.begin_survey(SurveyForm::new(), SurveyOrigin::Onboarding);
                self.set_status("Profile reset. Tell us what you like");
            }
            Err(err) => self.set_status(format!("Reset failed: {}", err.user_message())),
        }
    }

    // Input -------------------------------------------------------------------

    fn handle_input(&mut self, event: Event) -> Result<()> {
        let Event::Key(key) = event else {
            return Ok(());
        };
        if key.kind != KeyEventKind::Press {
            return Ok(());
        }
        if self.overlay.is_some() {
            self.handle_overlay_key(key);
            return Ok(());
        }
        if self.mode == Mode::Search {
            self.handle_search_key(key);
            return Ok(());
        }
        if self.handle_global_shortcut(&key) {
            return Ok(());
        }
        match self.screen {
            Screen::Home => self.handle_home_key(key),
            Screen::Recommendations => self.handle_recs_key(key),
            Screen::Survey => self.handle_survey_key(key),
            Screen::Detail => self.handle_detail_key(key),
            Screen::Library => self.handle_library_key(key),
            Screen::History => self.handle_history_key(key),
            Screen::Profile => self.handle_profile_key(key),
        }
        Ok(())
    }

    fn handle_global_shortcut(&mut self, key: &KeyEvent) -> bool {
        if key.modifiers == KeyModifiers::CONTROL {
            if let KeyCode::Char('c') = key.code {
                self.should_quit = true;
                return true;
            }
            if let KeyCode::Char('r') = key.code {
                if self.screen == Screen::Home {
                    self.catalog.invalidate();
                }
                self.open(self.screen);
                return true;
            }
            return false;
        }
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('a') => self.toggle_account(),
            KeyCode::Char(digit @ '1'..='6') => {
                let index = digit as usize - '1' as usize;
                self.open(Screen::NAV[index]);
            }
            _ => return false,
        }
        true
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.mode = Mode::Browse;
                self.query.search.clear();
                self.apply_query();
                self.set_status("Search cleared");
            }
            KeyCode::Enter => {
                self.mode = Mode::Browse;
                self.set_status(format!(
                    "Search applied: {} ({} games)",
                    self.query.search,
                    self.filtered.len()
                ));
            }
            KeyCode::Backspace => {
                self.query.search.pop();
                self.apply_query();
            }
            KeyCode::Char(c) => {
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT {
                    self.query.search.push(c);
                    self.apply_query();
                }
            }
            _ => {}
        }
    }

    fn handle_home_key(&mut self, key: KeyEvent) {
        let len = self.filtered.len();
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.home_list.move_by(1, len),
            KeyCode::Char('k') | KeyCode::Up => self.home_list.move_by(-1, len),
            KeyCode::Home => self.home_list.move_to(0, len),
            KeyCode::End | KeyCode::Char('G') => self.home_list.move_to_end(len),
            KeyCode::PageDown => self.home_list.page_down(len),
            KeyCode::PageUp => self.home_list.page_up(len),
            KeyCode::Char('/') => {
                self.mode = Mode::Search;
                self.set_status("Type to search titles");
            }
            KeyCode::Char('g') => {
                self.query.genre = next_genre(self.query.genre.as_deref());
                self.apply_query();
                let label = self.query.genre.as_deref().unwrap_or("All genres");
                self.set_status(format!("Genre: {label} ({} games)", self.filtered.len()));
            }
            KeyCode::Char('s') => {
                self.query.sort = self.query.sort.toggled();
                self.apply_query();
                self.set_status(format!("Sorted by {}", self.query.sort.label()));
            }
            KeyCode::Enter => {
                if let Some(game) = self.filtered.get(self.home_list.cursor).cloned() {
                    self.open_detail(game.game_id, game.title);
                }
            }
            _ => {}
        }
    }

    fn recs_games(&self) -> &[ScoredGame] {
        match &self.recs {
            RecsState::Done(RecommendationResult::Ready(games)) => games,
            _ => &[],
        }
    }

    fn handle_recs_key(&mut self, key: KeyEvent) {
        let len = self.recs_games().len();
        let selected = self
            .recs_games()
            .get(self.recs_list.cursor)
            .map(|scored| (scored.game.game_id.clone(), scored.game.title.clone()));
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.recs_list.move_by(1, len),
            KeyCode::Char('k') | KeyCode::Up => self.recs_list.move_by(-1, len),
            KeyCode::PageDown => self.recs_list.page_down(len),
            KeyCode::PageUp => self.recs_list.page_up(len),
            KeyCode::Char('+') | KeyCode::Char('l') => {
                if let Some((game_id, _)) = selected {
                    self.apply_gesture(game_id, Gesture::Like);
                }
            }
            KeyCode::Char('-') | KeyCode::Char('d') => {
                if let Some((game_id, _)) = selected {
                    self.apply_gesture(game_id, Gesture::Dislike);
                }
            }
            KeyCode::Char('t') => self.begin_survey(SurveyForm::new(), SurveyOrigin::Onboarding),
            KeyCode::Enter => {
                if let Some((game_id, title)) = selected {
                    self.open_detail(game_id, title);
                }
            }
            KeyCode::Esc => self.open(Screen::Home),
            _ => {}
        }
    }

    fn handle_survey_key(&mut self, key: KeyEvent) {
        if self.survey.busy {
            return;
        }
        match key.code {
            KeyCode::Esc => {
                let back = match self.survey.origin {
                    SurveyOrigin::Profile => Screen::Profile,
                    SurveyOrigin::Onboarding => Screen::Home,
                };
                self.open(back);
            }
            KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => self.survey.move_section(1),
            KeyCode::BackTab | KeyCode::Left | KeyCode::Char('h') => self.survey.move_section(-1),
            KeyCode::Char('j') | KeyCode::Down => self.survey.move_cursor(1),
            KeyCode::Char('k') | KeyCode::Up => self.survey.move_cursor(-1),
            KeyCode::Char(' ') | KeyCode::Char('x') => self.survey.toggle_current(),
            KeyCode::Enter => self.submit_survey(),
            _ => {}
        }
    }

    fn handle_detail_key(&mut self, key: KeyEvent) {
        let Some(state) = self.detail.as_mut() else {
            self.open(Screen::Home);
            return;
        };
        let similar_len = state.similar.ready().map(Vec::len).unwrap_or(0);
        let game_id = state.game_id.clone();
        let title = state.title.clone();
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => state.list.move_by(1, similar_len),
            KeyCode::Char('k') | KeyCode::Up => state.list.move_by(-1, similar_len),
            KeyCode::Char('+') => self.apply_gesture(game_id, Gesture::Like),
            KeyCode::Char('-') => self.apply_gesture(game_id, Gesture::Dislike),
            // Guests get the login prompt once they pick a status.
            KeyCode::Char('l') | KeyCode::Char('L') => self.open_chooser(game_id, title),
            KeyCode::Enter => {
                let next = state
                    .similar
                    .ready()
                    .and_then(|games| games.get(state.list.cursor))
                    .map(|scored| (scored.game.game_id.clone(), scored.game.title.clone()));
                if let Some((game_id, title)) = next {
                    self.open_detail(game_id, title);
                }
            }
            KeyCode::Esc | KeyCode::Backspace => {
                let back = self.detail_return;
                self.detail = None;
                self.open(back);
            }
            _ => {}
        }
    }

    fn handle_library_key(&mut self, key: KeyEvent) {
        let selected = self
            .visible_library()
            .get(self.library_list.cursor)
            .map(|entry| (entry.game_id.clone(), entry_title(entry)));
        let len = self.visible_library().len();
        match key.code {
            KeyCode::Tab | KeyCode::Right => {
                self.library_tab = (self.library_tab + 1) % LibraryTab::ALL.len();
                self.library_list.reset();
            }
            KeyCode::BackTab | KeyCode::Left => {
                self.library_tab =
                    (self.library_tab + LibraryTab::ALL.len() - 1) % LibraryTab::ALL.len();
                self.library_list.reset();
            }
            KeyCode::Char('j') | KeyCode::Down => self.library_list.move_by(1, len),
            KeyCode::Char('k') | KeyCode::Up => self.library_list.move_by(-1, len),
            KeyCode::Char('l') | KeyCode::Char('c') => {
                if let Some((game_id, title)) = selected {
                    self.open_chooser(game_id, title);
                }
            }
            KeyCode::Enter => {
                if let Some((game_id, title)) = selected {
                    self.open_detail(game_id, title);
                }
            }
            KeyCode::Esc => self.open(Screen::Home),
            _ => {}
        }
    }

    fn handle_history_key(&mut self, key: KeyEvent) {
        let len = self.history.len();
        let selected = self
            .history
            .games()
            .get(self.history_list.cursor)
            .map(|game| (game.game_id.clone(), game.title.clone()));
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.history_list.move_by(1, len),
            KeyCode::Char('k') | KeyCode::Up => self.history_list.move_by(-1, len),
            KeyCode::Char('+') => {
                if let Some((game_id, _)) = selected {
                    self.apply_gesture(game_id, Gesture::Like);
                }
            }
            KeyCode::Char('-') => {
                if let Some((game_id, _)) = selected {
                    self.apply_gesture(game_id, Gesture::Dislike);
                }
            }
            KeyCode::Char('x') | KeyCode::Delete => {
                if let Some((game_id, title)) = selected {
                    self.overlay = Some(Overlay::Confirm(Confirm::RemoveRating { game_id, title }));
                }
            }
            KeyCode::Enter => {
                if let Some((game_id, title)) = selected {
                    self.open_detail(game_id, title);
                }
            }
            KeyCode::Esc => self.open(Screen::Home),
            _ => {}
        }
    }

    fn handle_profile_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('e') => self.edit_preferences(),
            KeyCode::Char('R') => self.overlay = Some(Overlay::Confirm(Confirm::ResetProfile)),
            KeyCode::Esc => self.open(Screen::Home),
            _ => {}
        }
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) {
        let Some(overlay) = self.overlay.take() else {
            return;
        };
        match overlay {
            Overlay::Account(form) => self.handle_account_key(form, key),
            Overlay::Confirm(confirm) => match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => match confirm {
                    Confirm::RemoveRating { game_id, .. } => self.remove_rating(game_id),
                    Confirm::ResetProfile => self.reset_profile(),
                },
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    self.set_status("Cancelled");
                }
                _ => self.overlay = Some(Overlay::Confirm(confirm)),
            },
            Overlay::Chooser(mut chooser) => match key.code {
                KeyCode::Char('j') | KeyCode::Down => {
                    chooser.cursor = (chooser.cursor + 1).min(chooser.options.len() - 1);
                    self.overlay = Some(Overlay::Chooser(chooser));
                }
                KeyCode::Char('k') | KeyCode::Up => {
                    chooser.cursor = chooser.cursor.saturating_sub(1);
                    self.overlay = Some(Overlay::Chooser(chooser));
                }
                KeyCode::Enter => {
                    if let Some(choice) = chooser.options.get(chooser.cursor).copied() {
                        self.apply_library_choice(chooser.game_id, choice);
                    }
                }
                KeyCode::Esc => {}
                _ => self.overlay = Some(Overlay::Chooser(chooser)),
            },
        }
    }

    fn handle_account_key(&mut self, mut form: AccountForm, key: KeyEvent) {
        if key.modifiers == KeyModifiers::CONTROL {
            if let KeyCode::Char('t') = key.code {
                form.mode = form.mode.toggled();
                form.error = None;
            }
            self.overlay = Some(Overlay::Account(form));
            return;
        }
        match key.code {
            KeyCode::Esc => {
                if form.deferred.is_some() {
                    self.set_status("Login declined; nothing changed");
                } else {
                    self.set_status("Cancelled");
                }
                return;
            }
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Down | KeyCode::Up => form.next_field(),
            KeyCode::Backspace => {
                form.field_mut().pop();
            }
            KeyCode::Enter => {
                if form.focus == AccountField::Username && form.password.is_empty() {
                    form.next_field();
                } else {
                    self.overlay = Some(Overlay::Account(form));
                    self.submit_account();
                    return;
                }
            }
            KeyCode::Char(c) => {
                let field = form.field_mut();
                if field.chars().count() < MAX_FIELD_LEN {
                    field.push(c);
                }
            }
            _ => {}
        }
        self.overlay = Some(Overlay::Account(form));
    }
}

fn next_genre(current: Option<&str>) -> Option<String> {
    let next = match current {
        None => GENRES.first(),
        Some(label) => GENRES
            .iter()
            .position(|genre| *genre == label)
            .and_then(|index| GENRES.get(index + 1)),
    };
    next.map(|genre| genre.to_string())
}

fn entry_title(entry: &LibraryEntry) -> String {
    entry
        .title
        .clone()
        .unwrap_or_else(|| format!("Game {}", entry.game_id))
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::poll(TICK_RATE) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.blocking_send(AppEvent::Tick).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}

/// Cursor and scroll offset for one list.
#[derive(Debug, Clone, Copy)]
struct ListCursor {
    cursor: usize,
    offset: usize,
    height: usize,
}

impl Default for ListCursor {
    fn default() -> Self {
        Self {
            cursor: 0,
            offset: 0,
            height: 1,
        }
    }
}

impl ListCursor {
    fn reset(&mut self) {
        self.cursor = 0;
        self.offset = 0;
    }

    fn move_by(&mut self, delta: isize, len: usize) {
        if len == 0 {
            return;
        }
        let idx = (self.cursor as isize + delta).clamp(0, len as isize - 1);
        self.cursor = idx as usize;
        self.ensure_visible(len);
    }

    fn move_to(&mut self, index: usize, len: usize) {
        if len == 0 {
            return;
        }
        self.cursor = index.min(len - 1);
        self.ensure_visible(len);
    }

    fn move_to_end(&mut self, len: usize) {
        if len == 0 {
            return;
        }
        self.cursor = len - 1;
        self.ensure_visible(len);
    }

    fn page_down(&mut self, len: usize) {
        if len == 0 || self.height == 0 {
            return;
        }
        let delta = self.height.min(len);
        self.move_by(delta as isize, len);
    }

    fn page_up(&mut self, len: usize) {
        if len == 0 || self.height == 0 {
            return;
        }
        let delta = self.height.min(len);
        self.move_by(-(delta as isize), len);
    }

    fn clamp(&mut self, len: usize) {
        if len == 0 {
            self.cursor = 0;
            self.offset = 0;
        } else if self.cursor >= len {
            self.cursor = len - 1;
        }
        self.ensure_visible(len);
    }

    fn ensure_visible(&mut self, len: usize) {
        if len == 0 || self.height == 0 {
            self.offset = 0;
            return;
        }
        let height = self.height;
        let max_offset = len.saturating_sub(height);

        if self.cursor < self.offset {
            self.offset = self.cursor;
        } else if self.cursor >= self.offset + height {
            self.offset = self.cursor + 1 - height;
        }

        if self.offset > max_offset {
            self.offset = max_offset;
        }
    }

    /// Rows to render for a list of `len` items in `height` rows.
    fn window(&mut self, len: usize, height: usize) -> std::ops::Range<usize> {
        self.height = height.max(1);
        self.clamp(len);
        let end = (self.offset + self.height).min(len);
        self.offset.min(end)..end
    }
}

#[cfg(test)]
mod tests {
    use gamerec_core::{
        api::testing::{Call, FakeApi},
        error::ApiError,
        feedback::Feedback,
        library::LibraryMutation,
        models::LibraryStatus,
    };

    use super::*;

    fn app_over(api: &FakeApi) -> (GameRecApp, mpsc::Receiver<AppEvent>) {
        let mut app = GameRecApp::new(Arc::new(api.clone()), &AppConfig::default());
        let (event_tx, event_rx) = mpsc::channel(16);
        app.event_tx = Some(event_tx);
        (app, event_rx)
    }

    fn press(app: &mut GameRecApp, code: KeyCode) -> Result<()> {
        app.handle_input(Event::Key(KeyEvent::new(code, KeyModifiers::NONE)))
    }

    async fn pump(app: &mut GameRecApp, events: &mut mpsc::Receiver<AppEvent>, count: usize) {
        for _ in 0..count {
            let event = events.recv().await;
            assert!(event.is_some(), "event channel closed early");
            app.process_app_event(event);
        }
    }

    fn rated(id: i64, rating: f64) -> Game {
        let mut game = Game::new(id, format!("Game {id}"));
        game.rating = Some(rating);
        game
    }

    fn sign_in(app: &mut GameRecApp) {
        if let Some(Overlay::Account(form)) = app.overlay.as_mut() {
            form.username = "ana".to_string();
            form.password = "hunter2".to_string();
        }
        app.submit_account();
    }

    #[test]
    fn loads_with_an_old_ticket_are_discarded() {
        let (mut app, _events) = app_over(&FakeApi::default());
        app.ticket = 4;
        app.recs = RecsState::Loading;

        assert!(app.process_app_event(Some(AppEvent::RecommendationsLoaded(
            3,
            RecommendationResult::ColdStart
        ))));
        assert!(matches!(app.recs, RecsState::Loading));

        app.process_app_event(Some(AppEvent::RecommendationsLoaded(
            4,
            RecommendationResult::Empty,
        )));
        assert!(matches!(
            app.recs,
            RecsState::Done(RecommendationResult::Empty)
        ));
    }

    #[tokio::test]
    async fn navigating_again_supersedes_the_running_load() {
        let api = FakeApi::with_catalog(vec![Game::new(1, "Celeste")]);
        let (mut app, mut events) = app_over(&api);
        app.session.login(UserId::new("ana"));

        app.open(Screen::Recommendations);
        let first = app.ticket;
        app.open(Screen::Recommendations);
        assert_eq!(app.ticket, first + 1);

        pump(&mut app, &mut events, 1).await;
        assert!(matches!(
            &app.recs,
            RecsState::Done(RecommendationResult::Ready(games)) if games.len() == 1
        ));
    }

    #[test]
    fn settlements_for_another_user_are_ignored() {
        let (mut app, _events) = app_over(&FakeApi::default());
        app.session.login(UserId::new("ana"));
        app.feedback.track([&rated(1, 5.0)]);
        app.library.load(vec![LibraryEntry {
            game_id: GameId::Numeric(1),
            status: LibraryStatus::Playing,
            date: None,
            title: None,
            image: None,
        }]);

        let feedback = Resolution::Reconciled {
            mutation: Mutation {
                user: UserId::new("bob"),
                game_id: GameId::Numeric(1),
                rating: Some(1),
            },
            error: ApiError::Timeout(10),
            snapshot: Vec::new(),
        };
        app.process_app_event(Some(AppEvent::FeedbackSettled(feedback)));
        assert_eq!(app.feedback.state(&GameId::Numeric(1)), Feedback::Liked);

        let library = Resolution::Reconciled {
            mutation: LibraryMutation {
                user: UserId::new("bob"),
                game_id: GameId::Numeric(1),
                choice: LibraryChoice::Remove,
            },
            error: ApiError::Timeout(10),
            snapshot: Vec::new(),
        };
        app.process_app_event(Some(AppEvent::LibrarySettled(library)));
        assert!(app.library.contains(&GameId::Numeric(1)));
    }

    #[tokio::test]
    async fn deferred_gesture_replays_against_server_ratings() {
        let api = FakeApi::with_catalog(vec![Game::new(1, "Celeste")]);
        api.set_rating(1, 5.0);
        let (mut app, mut events) = app_over(&api);
        let id = GameId::Numeric(1);

        app.apply_gesture(id.clone(), Gesture::Like);
        assert!(matches!(
            &app.overlay,
            Some(Overlay::Account(AccountForm {
                deferred: Some(Deferred::Feedback(..)),
                ..
            }))
        ));
        assert!(api.mutation_calls().is_empty());

        sign_in(&mut app);
        pump(&mut app, &mut events, 1).await;
        assert!(app.overlay.is_none());
        assert_eq!(app.session.user(), Some(&UserId::new("ana")));
        // The server already had the like, so replaying it is an undo.
        assert_eq!(app.feedback.state(&id), Feedback::Unrated);
        assert!(app.feedback.is_pending(&id));

        pump(&mut app, &mut events, 1).await;
        assert_eq!(api.mutation_calls(), vec![Call::Unrate(id.clone())]);
        assert_eq!(api.rating(&id), None);
        assert!(!app.feedback.is_pending(&id));
    }

    #[test]
    fn declining_the_login_drops_the_gesture() -> Result<()> {
        let api = FakeApi::with_catalog(vec![Game::new(1, "Celeste")]);
        let (mut app, _events) = app_over(&api);

        app.apply_gesture(GameId::Numeric(1), Gesture::Dislike);
        assert!(app.overlay.is_some());
        press(&mut app, KeyCode::Esc)?;

        assert!(app.overlay.is_none());
        assert!(!app.session.is_authenticated());
        assert_eq!(app.feedback.state(&GameId::Numeric(1)), Feedback::Unrated);
        assert!(api.calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn login_from_guest_recommendations_reloads_them_for_the_user() {
        let api = FakeApi::with_catalog(vec![Game::new(1, "Celeste"), Game::new(2, "Hades")]);
        let (mut app, mut events) = app_over(&api);
        let guest = RecommendRequest::Guest(SurveyPreferences {
            genres: vec!["RPG".to_string()],
            ..SurveyPreferences::default()
        });
        app.guest_request = Some(guest);
        app.open(Screen::Recommendations);
        pump(&mut app, &mut events, 1).await;

        app.apply_gesture(GameId::Numeric(2), Gesture::Like);
        sign_in(&mut app);
        pump(&mut app, &mut events, 1).await;
        assert!(matches!(app.recs, RecsState::Loading));

        // Feedback settlement and the user's recommendations, in either order.
        pump(&mut app, &mut events, 2).await;
        let by_user = Call::Recommend(RecommendRequest::User {
            user_id: UserId::new("ana"),
        });
        assert!(api.calls().contains(&by_user));
        assert!(matches!(
            app.recs,
            RecsState::Done(RecommendationResult::Ready(_))
        ));
        assert_eq!(app.feedback.state(&GameId::Numeric(2)), Feedback::Liked);
        assert_eq!(api.rating(&GameId::Numeric(2)), Some(5.0));
    }

    #[test]
    fn guest_library_choice_is_deferred_behind_login() -> Result<()> {
        let (mut app, _events) = app_over(&FakeApi::default());
        app.screen = Screen::Detail;
        app.detail = Some(DetailState {
            game_id: GameId::Numeric(7),
            title: "Outer Wilds".to_string(),
            detail: Panel::Loading,
            similar: Panel::Loading,
            library: None,
            list: ListCursor::default(),
        });

        press(&mut app, KeyCode::Char('l'))?;
        assert!(matches!(app.overlay, Some(Overlay::Chooser(_))));
        press(&mut app, KeyCode::Enter)?;
        assert!(matches!(
            &app.overlay,
            Some(Overlay::Account(AccountForm {
                deferred: Some(Deferred::Library(GameId::Numeric(7), _)),
                ..
            }))
        ));
        Ok(())
    }

    #[test]
    fn cursor_scrolls_to_stay_visible() {
        let mut list = ListCursor::default();
        assert_eq!(list.window(10, 3), 0..3);
        list.move_by(4, 10);
        assert_eq!(list.cursor, 4);
        assert_eq!(list.window(10, 3), 2..5);
        list.move_to_end(10);
        assert_eq!(list.window(10, 3), 7..10);
        list.clamp(2);
        assert_eq!(list.cursor, 1);
        assert_eq!(list.window(2, 3), 0..2);
    }

    #[test]
    fn genre_filter_cycles_back_to_all() {
        let mut genre = None;
        for _ in 0..GENRES.len() {
            genre = next_genre(genre.as_deref());
            assert!(genre.is_some());
        }
        assert_eq!(genre.as_deref(), Some("Horror"));
        assert_eq!(next_genre(genre.as_deref()), None);
    }

    #[test]
    fn survey_cursor_stays_within_section() {
        let mut survey = SurveyState::new(SurveyForm::new(), SurveyOrigin::Onboarding);
        survey.move_section(1);
        assert_eq!(survey.category(), Category::Platform);
        survey.move_cursor(10);
        assert_eq!(survey.cursors[1], 2);
        survey.toggle_current();
        assert!(survey.form.is_selected(Category::Platform, "Mobile"));
        survey.move_section(-2);
        assert_eq!(survey.category(), Category::Mode);
    }
}
