use iced::{
    Element, Task,
    widget::{button, column, container, text, text_input},
};
use kelp_lib::{
    Alert, Backend, ProfileEditor,
    backend::Session,
    profile::{LoadOutcome, SaveOutcome},
};

use crate::components::avatar::{self, Avatar};

#[derive(Debug, Clone)]
pub enum Message {
    Loaded(LoadOutcome),
    Saved(SaveOutcome),
    FirstNameChanged(String),
    LastNameChanged(String),
    UpdatePressed,
    SignOutPressed,
    SignedOut(Result<(), Alert>),
    // Components
    Avatar(avatar::Message),
}

pub enum Action {
    None,
    Run(Task<Message>),
    Alert(Alert),
}

/// The signed-in user's profile. Lives as long as the same user stays signed in.
pub struct Account {
    backend: Backend,
    key: String,
    editor: ProfileEditor,
    // Components
    avatar: Avatar,
}

impl Account {
    /// Mount the account screen for `session` and start loading its profile.
    pub fn new(backend: Backend, session: Session) -> (Self, Action) {
        let key = session.user_id().unwrap_or_default().to_string();

        let mut account = Self {
            avatar: Avatar::new(backend.clone(), key.clone()),
            backend,
            key,
            editor: ProfileEditor::new(session),
        };
        let action = account.load();

        (account, action)
    }

    /// Identifies the user this screen belongs to.
    pub fn key(&self) -> &str {
        &self.key
    }

    #[cfg(test)]
    pub fn editor(&self) -> &ProfileEditor {
        &self.editor
    }

    /// Take a newer session for the same user and reload the profile if it changed.
    pub fn set_session(&mut self, session: Session) -> Action {
        if self.editor.set_session(session) {
            self.load()
        } else {
            Action::None
        }
    }

    pub fn update(&mut self, message: Message) -> Action {
        match message {
            Message::Loaded(outcome) => match self.editor.finish_load(outcome) {
                Some(alert) => Action::Alert(alert),
                None => Action::Run(
                    self.avatar
                        .show(self.editor.avatar_url())
                        .map(Message::Avatar),
                ),
            },
            Message::Saved(outcome) => match self.editor.finish_save(outcome) {
                Some(alert) => Action::Alert(alert),
                None => Action::None,
            },
            Message::FirstNameChanged(first_name) => {
                self.editor.set_first_name(first_name);
                Action::None
            }
            Message::LastNameChanged(last_name) => {
                self.editor.set_last_name(last_name);
                Action::None
            }
            Message::UpdatePressed => match self.editor.begin_save() {
                Ok(record) => Action::Run(Task::perform(
                    ProfileEditor::persist(self.backend.clone(), record),
                    Message::Saved,
                )),
                Err(alert) => Action::Alert(alert),
            },
            Message::SignOutPressed => {
                let backend = self.backend.clone();

                Action::Run(Task::perform(
                    async move {
                        backend
                            .auth()
                            .sign_out()
                            .await
                            .map_err(|err| Alert::from_error(&err))
                    },
                    Message::SignedOut,
                ))
            }
            // The auth service announces the sign-out and the root unmounts this screen
            Message::SignedOut(Ok(())) => Action::None,
            Message::SignedOut(Err(alert)) => Action::Alert(alert),
            Message::Avatar(message) => match self.avatar.update(message) {
                avatar::Action::None => Action::None,
                avatar::Action::Run(task) => Action::Run(task.map(Message::Avatar)),
                avatar::Action::Alert(alert) => Action::Alert(alert),
                avatar::Action::Uploaded(key) => match self.editor.begin_avatar_save(key) {
                    Ok(record) => Action::Run(Task::batch([
                        Task::perform(
                            ProfileEditor::persist(self.backend.clone(), record),
                            Message::Saved,
                        ),
                        self.avatar
                            .show(self.editor.avatar_url())
                            .map(Message::Avatar),
                    ])),
                    Err(alert) => Action::Alert(alert),
                },
            },
        }
    }

    pub fn view(&self) -> Element<'_, Message> {
        let loading = self.editor.loading();
        let email = self.editor.session().email().unwrap_or_default();

        container(
            column![
                self.avatar.view().map(Message::Avatar),
                text("Email"),
                // No on_input, so the field is read-only
                text_input("", email),
                text("First name"),
                text_input("", self.editor.first_name()).on_input(Message::FirstNameChanged),
                text("Last name"),
                text_input("", self.editor.last_name()).on_input(Message::LastNameChanged),
                button(if loading { "Loading ..." } else { "Update" })
                    .on_press_maybe((!loading).then_some(Message::UpdatePressed)),
                button("Sign Out").on_press(Message::SignOutPressed),
            ]
            .spacing(4)
            .max_width(420),
        )
        .padding(12)
        .into()
    }

    fn load(&mut self) -> Action {
        match self.editor.begin_load() {
            Ok(request) => Action::Run(Task::perform(
                ProfileEditor::fetch(self.backend.clone(), request),
                Message::Loaded,
            )),
            Err(alert) => Action::Alert(alert),
        }
    }
}
