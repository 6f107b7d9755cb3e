use iced::{
    Color, Element,
    Length::{self, Fill},
    Task, Theme, application,
    task,
    widget::{button, center, column, container, mouse_area, opaque, row, space, stack, text},
};
use kelp_lib::{
    Alert, Backend, Screen, SessionController,
    backend::{AuthEvent, Session},
    config::CoreConfig,
};
use tracing::{Level, error};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::{
    components::{
        account::{self, Account},
        sign_in::{self, SignIn},
    },
    config::GuiConfig,
};

pub mod components;
pub mod config;

fn main() -> iced::Result {
    application(App::new, App::update, App::view)
        .theme(App::theme)
        .title(App::title)
        .run()
}

#[derive(Debug, Clone)]
enum Message {
    SessionFetched(Option<Session>),
    AuthChanged(AuthEvent),
    AlertDismissed,
    // Components
    SignIn(sign_in::Message),
    /// Tagged with the key of the account screen that sent it
    Account(String, account::Message),
}

enum State {
    /// The backend isn't configured, nothing to do but say so
    Error(String),
    Ready(Box<Root>),
}

struct App {
    title: String,
    theme: Theme,
    state: State,
    alert: Option<Alert>,
}

/// Tracks the auth session and shows the screen that goes with it.
struct Root {
    backend: Backend,
    session: SessionController,
    // Components
    sign_in: SignIn,
    account: Option<Account>,
    /// Dropping this aborts the auth event stream, which unsubscribes
    _auth_events: task::Handle,
}

impl App {
    pub fn new() -> (Self, Task<Message>) {
        // Human friendly panicking in release mode
        human_panic::setup_panic!();

        // Logging
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::TRACE)
            .with_env_filter(EnvFilter::from_default_env())
            .finish();
        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Failed to set up logging: {err}");
        }

        let cfg = GuiConfig::load();
        let theme = cfg.theme();

        let (state, task) = match CoreConfig::load(None)
            .map_err(kelp_lib::Error::from)
            .and_then(Backend::supabase)
        {
            Ok(backend) => {
                let (root, task) = Root::new(backend);
                (State::Ready(Box::new(root)), task)
            }
            Err(err) => {
                error!("Unable to reach the backend: {err}");
                (State::Error(err.to_string()), Task::none())
            }
        };

        (
            Self {
                title: "Kelp".into(),
                theme,
                state,
                alert: None,
            },
            task,
        )
    }

    // Update application state based on messages passed by view()
    pub fn update(&mut self, message: Message) -> Task<Message> {
        if let Message::AlertDismissed = message {
            self.alert = None;
            return Task::none();
        }

        let State::Ready(root) = &mut self.state else {
            return Task::none();
        };

        let (task, alert) = root.update(message);
        if alert.is_some() {
            self.alert = alert;
        }

        task
    }

    // Render the application and pass along messages from components to update()
    pub fn view(&self) -> Element<'_, Message> {
        let content = match &self.state {
            State::Error(err) => center(
                column![
                    text("Kelp can't reach its backend").size(20),
                    text(err.as_str()),
                    text(format!(
                        "Set `url` and `anon_key` in kelp.toml, or {} and {}.",
                        kelp_lib::config::URL_VAR,
                        kelp_lib::config::ANON_KEY_VAR
                    )),
                ]
                .spacing(8),
            )
            .into(),
            State::Ready(root) => root.view(),
        };

        match &self.alert {
            Some(alert) => modal(
                content,
                container(
                    column![
                        text(alert.message()),
                        row![
                            space::horizontal(),
                            button("OK").on_press(Message::AlertDismissed)
                        ],
                    ]
                    .spacing(12),
                )
                .padding(20)
                .width(360)
                .style(container::rounded_box),
                Some(Message::AlertDismissed),
            ),
            None => content,
        }
    }

    pub fn title(&self) -> String {
        self.title.clone()
    }

    pub fn theme(&self) -> Theme {
        self.theme.clone()
    }
}

impl Root {
    fn new(backend: Backend) -> (Self, Task<Message>) {
        let mut session = SessionController::new(backend.clone());

        let (auth_events, handle) = match session.take_subscription() {
            Some(subscription) => {
                Task::run(subscription.into_stream(), Message::AuthChanged).abortable()
            }
            None => Task::none().abortable(),
        };

        let fetch = Task::perform(
            SessionController::fetch_session(backend.clone()),
            Message::SessionFetched,
        );

        (
            Self {
                backend,
                session,
                sign_in: SignIn::new(),
                account: None,
                _auth_events: handle.abort_on_drop(),
            },
            Task::batch([fetch, auth_events]),
        )
    }

    fn update(&mut self, message: Message) -> (Task<Message>, Option<Alert>) {
        match message {
            Message::SessionFetched(session) => {
                self.session.set_session(session);
                self.sync_screen()
            }
            Message::AuthChanged(event) => {
                self.session.apply(event);
                self.sync_screen()
            }
            // Redirect messages to relevant child components
            Message::SignIn(msg) => match self.sign_in.update(&self.backend, msg) {
                sign_in::Action::None => (Task::none(), None),
                sign_in::Action::Run(task) => (task.map(Message::SignIn), None),
                sign_in::Action::Alert(alert) => (Task::none(), Some(alert)),
            },
            Message::Account(key, msg) => match &mut self.account {
                // Results meant for an account screen that has since gone away are dropped
                Some(account) if account.key() == key => {
                    Self::account_action(key, account.update(msg))
                }
                _ => (Task::none(), None),
            },
            Message::AlertDismissed => (Task::none(), None),
        }
    }

    /// Make the shown screen match the session: the sign-in screen without a user, and an
    /// account screen keyed by the user's identifier otherwise.
    fn sync_screen(&mut self) -> (Task<Message>, Option<Alert>) {
        let key = match self.session.screen() {
            Screen::SignIn => {
                self.account = None;
                return (Task::none(), None);
            }
            Screen::Account { key } => key,
        };

        let Some(session) = self.session.session().cloned() else {
            return (Task::none(), None);
        };

        match &mut self.account {
            Some(account) if account.key() == key => {
                Self::account_action(key, account.set_session(session))
            }
            _ => {
                let (account, action) = Account::new(self.backend.clone(), session);
                self.account = Some(account);
                Self::account_action(key, action)
            }
        }
    }

    fn account_action(key: String, action: account::Action) -> (Task<Message>, Option<Alert>) {
        match action {
            account::Action::None => (Task::none(), None),
            account::Action::Run(task) => (
                task.map(move |msg| Message::Account(key.clone(), msg)),
                None,
            ),
            account::Action::Alert(alert) => (Task::none(), Some(alert)),
        }
    }

    fn view(&self) -> Element<'_, Message> {
        let screen = match &self.account {
            Some(account) => {
                let key = account.key().to_string();
                account
                    .view()
                    .map(move |msg| Message::Account(key.clone(), msg))
            }
            None => self.sign_in.view().map(Message::SignIn),
        };

        container(screen)
            .padding(12)
            .center_x(Fill)
            .height(Fill)
            .into()
    }
}

pub fn modal<'a, Message>(
    base: impl Into<Element<'a, Message>>,
    content: impl Into<Element<'a, Message>>,
    on_click_outside: Option<Message>,
) -> Element<'a, Message>
where
    Message: Clone + 'a,
{
    let mouse_area = mouse_area(center(opaque(content)).style(|_theme| {
        container::Style {
            background: Some(
                Color {
                    a: 0.8,
                    ..Color::BLACK
                }
                .into(),
            ),
            ..container::Style::default()
        }
    }));

    stack![
        base.into(),
        opaque(if let Some(msg) = on_click_outside {
            mouse_area.on_press(msg)
        } else {
            mouse_area
        })
    ]
    .width(Length::Fill)
    .height(Length::Fill)
    .into()
}

#[cfg(test)]
mod test {
    use kelp_lib::backend::{AuthChangeEvent, MemoryBackend, ProfileFields, User};

    use super::*;

    fn session(user_id: &str, access_token: &str) -> Session {
        Session {
            access_token: access_token.into(),
            refresh_token: String::new(),
            expires_at: None,
            user: Some(User {
                id: user_id.into(),
                email: Some(format!("{user_id}@x.com")),
            }),
        }
    }

    fn loaded(first_name: &str) -> account::Message {
        account::Message::Loaded(Ok(ProfileFields {
            first_name: first_name.into(),
            ..ProfileFields::default()
        }))
    }

    fn auth_changed(kind: AuthChangeEvent, session: Option<Session>) -> Message {
        Message::AuthChanged(AuthEvent::new(kind, session))
    }

    #[test]
    fn test_account_screen_follows_user() {
        let (mut root, _) = Root::new(Backend::memory(MemoryBackend::new()));

        let _ = root.update(Message::SessionFetched(None));
        assert!(root.account.is_none());

        let _ = root.update(Message::SessionFetched(Some(session("u1", "a1"))));
        assert_eq!(root.account.as_ref().map(Account::key), Some("u1"));

        let _ = root.update(auth_changed(
            AuthChangeEvent::SignedIn,
            Some(session("u2", "a2")),
        ));
        assert_eq!(root.account.as_ref().map(Account::key), Some("u2"));

        // The first user's profile arrives after the switch and is dropped
        let _ = root.update(Message::Account("u1".into(), loaded("Ann")));
        let account = root.account.as_ref().unwrap();
        assert_eq!(account.editor().first_name(), "");
        assert!(account.editor().loading());

        let _ = root.update(Message::Account("u2".into(), loaded("Bob")));
        let account = root.account.as_ref().unwrap();
        assert_eq!(account.editor().first_name(), "Bob");
        assert!(!account.editor().loading());

        let _ = root.update(auth_changed(AuthChangeEvent::SignedOut, None));
        assert!(root.account.is_none());
    }

    #[test]
    fn test_refreshed_session_keeps_account() {
        let (mut root, _) = Root::new(Backend::memory(MemoryBackend::new()));
        let _ = root.update(Message::SessionFetched(Some(session("u1", "a1"))));
        let _ = root.update(Message::Account("u1".into(), loaded("Ann")));

        let _ = root.update(auth_changed(
            AuthChangeEvent::TokenRefreshed,
            Some(session("u1", "a2")),
        ));

        // Same screen, reloading with the new session
        let account = root.account.as_ref().unwrap();
        assert_eq!(account.key(), "u1");
        assert_eq!(account.editor().first_name(), "Ann");
        assert!(account.editor().loading());
        assert_eq!(account.editor().session().access_token, "a2");
    }
}
