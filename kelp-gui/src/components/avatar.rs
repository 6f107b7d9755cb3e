use std::path::PathBuf;

use iced::{
    Element, Length, Task,
    widget::{button, column, container, image, text},
};
use kelp_lib::{Alert, Backend, avatar};
use rfd::AsyncFileDialog;
use tracing::warn;

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

#[derive(Debug, Clone)]
pub enum Message {
    UploadPressed,
    Picked(Option<PathBuf>),
    Uploaded(Result<String, Alert>),
    Downloaded(String, Result<Vec<u8>, Alert>),
}

pub enum Action {
    None,
    Run(Task<Message>),
    /// A new image is stored under this key
    Uploaded(String),
    Alert(Alert),
}

/// Shows the avatar stored under a key and uploads replacements picked from disk.
pub struct Avatar {
    backend: Backend,
    user_id: String,
    size: f32,
    key: String,
    image: Option<image::Handle>,
    uploading: bool,
}

impl Avatar {
    pub fn new(backend: Backend, user_id: String) -> Self {
        let size = f32::from(backend.cfg().read().avatar_size);

        Self {
            backend,
            user_id,
            size,
            key: String::new(),
            image: None,
            uploading: false,
        }
    }

    /// Point the avatar at `key`, fetching the image if it isn't already shown.
    pub fn show(&mut self, key: &str) -> Task<Message> {
        if key == self.key && (key.is_empty() || self.image.is_some()) {
            return Task::none();
        }

        self.key = key.to_string();
        self.image = None;

        if key.is_empty() {
            return Task::none();
        }

        let key = self.key.clone();
        Task::perform(
            avatar::download(self.backend.clone(), key.clone()),
            move |result| Message::Downloaded(key.clone(), result.map_err(Alert::from)),
        )
    }

    pub fn update(&mut self, message: Message) -> Action {
        match message {
            Message::UploadPressed => {
                self.uploading = true;

                Action::Run(Task::perform(
                    async {
                        AsyncFileDialog::new()
                            .add_filter("Images", IMAGE_EXTENSIONS.as_slice())
                            .pick_file()
                            .await
                            .map(|file_handle| file_handle.path().to_path_buf())
                    },
                    Message::Picked,
                ))
            }
            Message::Picked(None) => {
                self.uploading = false;
                Action::None
            }
            Message::Picked(Some(path)) => Action::Run(Task::perform(
                avatar::upload_from_path(self.backend.clone(), self.user_id.clone(), path),
                |result| Message::Uploaded(result.map_err(Alert::from)),
            )),
            Message::Uploaded(result) => {
                self.uploading = false;

                match result {
                    Ok(key) => Action::Uploaded(key),
                    Err(alert) => Action::Alert(alert),
                }
            }
            Message::Downloaded(key, result) => {
                // A newer key may have been shown since this download started
                if key != self.key {
                    return Action::None;
                }

                match result {
                    Ok(bytes) => self.image = Some(image::Handle::from_bytes(bytes)),
                    Err(alert) => warn!("Unable to download avatar {key}: {alert}"),
                }

                Action::None
            }
        }
    }

    pub fn view(&self) -> Element<'_, Message> {
        let picture: Element<'_, Message> = match &self.image {
            Some(handle) => image(handle.clone())
                .width(self.size)
                .height(self.size)
                .into(),
            None => container(text("No image"))
                .center(Length::Fixed(self.size))
                .style(container::bordered_box)
                .into(),
        };

        column![
            picture,
            button(if self.uploading {
                "Uploading ..."
            } else {
                "Upload"
            })
            .on_press_maybe((!self.uploading).then_some(Message::UploadPressed)),
        ]
        .spacing(8)
        .into()
    }
}
