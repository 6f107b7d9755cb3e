use iced::{
    Element, Task,
    widget::{button, column, container, row, text, text_input},
};
use kelp_lib::{Alert, Backend, SignInForm, sign_in::SignInOutcome};

#[derive(Debug, Clone)]
pub enum Message {
    EmailChanged(String),
    PasswordChanged(String),
    SignInPressed,
    SignUpPressed,
    Finished(SignInOutcome),
}

pub enum Action {
    None,
    Run(Task<Message>),
    Alert(Alert),
}

/// Email and password sign-in. On success the auth service announces the new session and
/// the root swaps this screen out, so nothing is handed back from here.
#[derive(Default)]
pub struct SignIn {
    form: SignInForm,
}

impl SignIn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, backend: &Backend, message: Message) -> Action {
        match message {
            Message::EmailChanged(email) => {
                self.form.set_email(email);
                Action::None
            }
            Message::PasswordChanged(password) => {
                self.form.set_password(password);
                Action::None
            }
            Message::SignInPressed => {
                let credentials = self.form.begin();
                Action::Run(run(SignInForm::sign_in(backend.clone(), credentials)))
            }
            Message::SignUpPressed => {
                let credentials = self.form.begin();
                Action::Run(run(SignInForm::sign_up(backend.clone(), credentials)))
            }
            Message::Finished(outcome) => match self.form.finish(outcome) {
                Some(alert) => Action::Alert(alert),
                None => Action::None,
            },
        }
    }

    pub fn view(&self) -> Element<'_, Message> {
        let idle = !self.form.loading();

        container(
            column![
                text("Email"),
                text_input("email@address.com", self.form.email())
                    .on_input(Message::EmailChanged),
                text("Password"),
                text_input("Password", self.form.password())
                    .secure(true)
                    .on_input(Message::PasswordChanged)
                    .on_submit_maybe(idle.then_some(Message::SignInPressed)),
                row![
                    button("Sign in").on_press_maybe(idle.then_some(Message::SignInPressed)),
                    button("Sign up").on_press_maybe(idle.then_some(Message::SignUpPressed)),
                ]
                .spacing(8),
            ]
            .spacing(4)
            .max_width(420),
        )
        .padding(12)
        .into()
    }
}

fn run(attempt: impl Future<Output = SignInOutcome> + Send + 'static) -> Task<Message> {
    Task::perform(attempt, Message::Finished)
}
