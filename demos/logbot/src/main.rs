use std::process::ExitCode;

use cordwire::prelude::*;
use tracing::{debug, error, info};

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `true` if `user` is the account this client is logged in as.
fn is_me(session: &SessionWatch, user: Option<Snowflake>) -> bool {
    user.is_some() && session.user_id() == user
}

fn register(client: &mut GatewayClient) {
    let session = client.session();

    client.on(EventKind::Ready, |event| async move {
        if let Event::Ready(ready) = event {
            info!(user = %ready.user, "ready");
        }
        Ok::<(), HandlerError>(())
    });

    let me = session.clone();
    client.on(EventKind::MessageCreate, move |event| {
        let me = me.clone();
        async move {
            let Some(message) = event.as_message() else {
                return Ok(());
            };
            let author = message.author.as_ref();
            if is_me(&me, author.map(|a| a.id)) {
                return Ok(());
            }
            let name = author.map(|a| a.name()).unwrap_or("unknown");
            info!(channel = %message.channel_id, "message from {name}: {}", message.content);

            let mentioned = me
                .current()
                .is_some_and(|s| s.user.mentioned_in(message));
            if mentioned {
                let parts = chunk_content(&message.content, MAX_CONTENT_LEN).len();
                info!(parts, "mentioned by {name}");
            }
            Ok::<(), HandlerError>(())
        }
    });

    let me = session.clone();
    client.on(EventKind::MessageUpdate, move |event| {
        let me = me.clone();
        async move {
            if let Some(message) = event.as_message() {
                let author = message.author.as_ref();
                if !is_me(&me, author.map(|a| a.id)) {
                    let name = author.map(|a| a.name()).unwrap_or("unknown");
                    info!("message edited by {name}: {}", message.content);
                }
            }
            Ok::<(), HandlerError>(())
        }
    });

    client.on(EventKind::MessageDelete, |event| async move {
        if let Event::MessageDelete(deleted) = event {
            info!("message deleted in channel {}", deleted.channel_id);
        }
        Ok::<(), HandlerError>(())
    });

    for kind in [EventKind::ReactionAdd, EventKind::ReactionRemove] {
        let me = session.clone();
        client.on(kind, move |event| {
            let me = me.clone();
            async move {
                if let Event::ReactionAdd(reaction) | Event::ReactionRemove(reaction) = &event {
                    if !is_me(&me, Some(reaction.user_id)) {
                        info!(event = %event.kind(), "{reaction}");
                    }
                }
                Ok::<(), HandlerError>(())
            }
        });
    }

    let me = session;
    client.on(EventKind::TypingStart, move |event| {
        let me = me.clone();
        async move {
            if let Event::TypingStart(typing) = event {
                if !is_me(&me, Some(typing.user_id)) {
                    debug!("{typing}");
                }
            }
            Ok::<(), HandlerError>(())
        }
    });
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("logbot: {e}");
            return ExitCode::FAILURE;
        }
    };
    cordwire::logging::init(config.verbose);

    let mut client = GatewayClient::new(config);
    register(&mut client);

    info!("starting logbot");
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "ctrl-c handler failed");
            std::future::pending::<()>().await;
        }
        info!("shutting down");
    };

    match client.run_until(shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fatal");
            ExitCode::FAILURE
        }
    }
}
