use std::path::PathBuf;

use clap::Subcommand;
use colored::Colorize;
use kelp_lib::{Backend, ProfileEditor, avatar};

use crate::{Failure, require_session};

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the profile
    Show,
    /// Change one or both names
    Set {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
    },
    /// Upload an image and make it the avatar
    Avatar { path: PathBuf },
}

pub async fn handle(backend: &Backend, cmd: &Command) -> Result<(), Failure> {
    let session = require_session(backend).await?;
    let mut editor = ProfileEditor::new(session);

    if let Some(alert) = editor.load(backend).await {
        return Err(alert.into());
    }

    match cmd {
        Command::Show => {
            print(&editor);
            Ok(())
        }
        Command::Set {
            first_name,
            last_name,
        } => {
            if let Some(first_name) = first_name {
                editor.set_first_name(first_name.as_str());
            }
            if let Some(last_name) = last_name {
                editor.set_last_name(last_name.as_str());
            }

            if let Some(alert) = editor.save(backend).await {
                return Err(alert.into());
            }

            print(&editor);
            Ok(())
        }
        Command::Avatar { path } => {
            let user_id = editor.session().user_id().unwrap_or_default().to_string();
            let key = avatar::upload_from_path(backend.clone(), user_id, path).await?;

            if let Some(alert) = editor.avatar_uploaded(backend, key).await {
                return Err(alert.into());
            }

            print(&editor);
            Ok(())
        }
    }
}

fn print(editor: &ProfileEditor) {
    let email = editor.session().email().unwrap_or_default();

    println!("{:>11} {}", "Email:".bold(), email);
    println!("{:>11} {}", "First name:".bold(), editor.first_name());
    println!("{:>11} {}", "Last name:".bold(), editor.last_name());
    println!("{:>11} {}", "Avatar:".bold(), editor.avatar_url());
}

#[cfg(test)]
mod test {
    use kelp_lib::backend::{MemoryBackend, ProfileFields, ProfileRecord, StoreError};

    use super::*;

    async fn signed_in() -> (MemoryBackend, Backend, String) {
        let memory = MemoryBackend::new();
        let user = memory.add_user("a@x.com", "hunter2");
        let backend = Backend::memory(memory.clone());
        backend
            .auth()
            .sign_in_with_password("a@x.com", "hunter2")
            .await
            .unwrap();

        (memory, backend, user.id)
    }

    #[tokio::test]
    async fn test_signed_out() {
        let backend = Backend::memory(MemoryBackend::new());

        assert!(matches!(
            handle(&backend, &Command::Show).await,
            Err(Failure::SignedOut)
        ));
    }

    #[tokio::test]
    async fn test_set_keeps_other_fields() {
        let (memory, backend, user_id) = signed_in().await;
        memory.put_profile(ProfileRecord {
            id: user_id.clone(),
            fields: ProfileFields {
                first_name: "Ann".into(),
                last_name: "Lee".into(),
                avatar_url: "u1/avatar.png".into(),
            },
            updated_at: chrono::Utc::now(),
        });

        handle(
            &backend,
            &Command::Set {
                first_name: Some("Anna".into()),
                last_name: None,
            },
        )
        .await
        .unwrap();

        let saved = memory.profile(&user_id).unwrap();
        assert_eq!(saved.fields.first_name, "Anna");
        assert_eq!(saved.fields.last_name, "Lee");
        assert_eq!(saved.fields.avatar_url, "u1/avatar.png");
    }

    #[tokio::test]
    async fn test_load_failure_is_surfaced() {
        let (memory, backend, _) = signed_in().await;
        memory.fail_next_select(StoreError::Response {
            status: 500,
            message: "boom".into(),
        });

        match handle(&backend, &Command::Show).await {
            Err(Failure::Alert(alert)) => assert_eq!(alert.message(), "boom"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(memory.upsert_calls(), 0);
    }

    #[tokio::test]
    async fn test_avatar() {
        let (memory, backend, user_id) = signed_in().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("me.png");
        std::fs::write(&path, b"png").unwrap();

        handle(&backend, &Command::Avatar { path }).await.unwrap();

        let saved = memory.profile(&user_id).unwrap();
        assert!(saved.fields.avatar_url.starts_with(&format!("{user_id}/")));
        assert_eq!(
            memory.object("avatars", &saved.fields.avatar_url).unwrap(),
            b"png"
        );
    }
}
