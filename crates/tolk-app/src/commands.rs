use std::sync::Arc;

use serde::Serialize;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tolk_auth::Registration;

use crate::cli::{Command, DeeplCommand};
use crate::events::event_loop;
use crate::state::AppState;

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn run(state: Arc<AppState>, command: Command, cancel: CancellationToken) -> anyhow::Result<()> {
    match command {
        Command::Translate {
            vendor,
            from,
            to,
            text,
        } => {
            let vendor = vendor.unwrap_or_else(|| state.config.translator.vendor.clone());
            let translation = state.translate(&vendor, text, from, to).await?;
            print_json(&translation)?;
        }
        Command::Vendors => {
            for name in state.registry.names() {
                let vendor = state.registry.get(name)?;
                let metadata = vendor.metadata();
                println!("{}\t{}\t{}", metadata.name, metadata.title, metadata.public_url);
            }
        }
        Command::Deepl { command } => deepl(&state, command).await?,
        Command::Login { username, password } => {
            state
                .auth
                .login(
                    state.channel.as_ref(),
                    &state.config.translator.my_translator.base_url,
                    &username,
                    &password,
                )
                .await?;
            println!("Logged in as {username}");
        }
        Command::Register {
            phone,
            name,
            username,
            password,
        } => {
            let registration = Registration {
                username,
                password,
                phone,
                name,
            };
            state
                .auth
                .register(
                    state.channel.as_ref(),
                    &state.config.translator.my_translator.base_url,
                    &registration,
                )
                .await?;
            println!("Registered and logged in as {}", registration.phone);
        }
        Command::Profile => {
            let profile = state
                .auth
                .profile(
                    state.channel.as_ref(),
                    &state.config.translator.my_translator.base_url,
                )
                .await?;
            print_json(&profile)?;
        }
        Command::Logout => {
            state.auth.logout();
            println!("Logged out");
        }
        Command::History { clear } => {
            if clear {
                state.history.clear();
            } else {
                print_json(&state.history.entries())?;
            }
        }
        Command::Serve => {
            let stdin = BufReader::new(tokio::io::stdin());
            event_loop(state, stdin, tokio::io::stdout(), cancel).await?;
        }
    }

    Ok(())
}

async fn deepl(state: &AppState, command: DeeplCommand) -> anyhow::Result<()> {
    match command {
        DeeplCommand::Usage => print_json(&state.deepl.usage().await?)?,
        DeeplCommand::Languages { kind, dump } => {
            if dump {
                print_json(&state.deepl.dump_languages().await?)?;
            } else {
                print_json(&state.deepl.supported_languages(kind.into()).await?)?;
            }
        }
        DeeplCommand::SetKey { key } => {
            state.deepl.set_auth_key(&key)?;
            println!("DeepL auth key saved");
        }
    }

    Ok(())
}
