use dotenv::dotenv;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use brandlink_chat::auth::{EnvToken, IdentityCache, TokenProvider};
use brandlink_chat::realtime::{NoRealtime, PusherChannel};
use brandlink_chat::transport::HttpTransport;
use brandlink_chat::{ChatConfig, ChatError, ChatSession, ChatView, SessionEvent, SessionSettings};

const USAGE: &str = "usage: brandlink-chat <conversation-id> | --with-user <user-id>";

/// Which conversation to open.
enum Target {
    Conversation(i64),
    /// Create or reuse the conversation with this user first.
    WithUser(i64),
}

#[tokio::main]
async fn main() -> Result<(), ChatError> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let target = parse_target(&args)?;
    let config = ChatConfig::from_env();

    let tokens: Arc<dyn TokenProvider> = Arc::new(EnvToken::new("CHAT_TOKEN"));
    let transport = Arc::new(HttpTransport::new(&config, tokens.clone())?);

    let identity = IdentityCache::new(config.identity_ttl);
    let me = identity.current_user(&transport).await?;
    tracing::info!("Signed in as user {}", me.id);

    let conversation_id = match target {
        Target::Conversation(id) => id,
        Target::WithUser(user_id) => transport.open_conversation(user_id).await?,
    };

    let settings = SessionSettings::from(&config);
    let (session, mut events) = match config.pusher.clone() {
        Some(pusher) => ChatSession::open(
            transport,
            Arc::new(PusherChannel::new(pusher, tokens)?),
            conversation_id,
            me.id,
            settings,
        ),
        None => {
            tracing::info!("PUSHER_APP_KEY not set, running in polling mode");
            ChatSession::open(transport, Arc::new(NoRealtime), conversation_id, me.id, settings)
        }
    };

    let mut view = session.watch();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = view.borrow_and_update().clone();
                render(&snapshot, me.id);
            }
            Some(event) = events.recv() => report(event),
            line = lines.next_line() => match line? {
                Some(text) => {
                    session.send(text);
                }
                // stdin closed
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.close().await;
    Ok(())
}

fn parse_target(args: &[String]) -> Result<Target, ChatError> {
    let usage = || ChatError::Usage(USAGE.to_string());

    match args {
        [flag, user_id] if flag == "--with-user" => {
            user_id.parse().map(Target::WithUser).map_err(|_| usage())
        }
        [conversation_id] => conversation_id
            .parse()
            .map(Target::Conversation)
            .map_err(|_| usage()),
        _ => Err(usage()),
    }
}

fn render(view: &ChatView, me: i64) {
    if view.loading {
        println!("Loading conversation {}...", view.conversation_id);
        return;
    }

    println!(
        "\n== conversation {} [{}] ==",
        view.conversation_id,
        view.connection.indicator()
    );

    for message in view.messages.iter().rev().take(20).rev() {
        let who = if message.sender_id == me {
            "You".to_string()
        } else {
            message
                .sender
                .as_ref()
                .map(|s| s.name.clone())
                .unwrap_or_else(|| format!("user {}", message.sender_id))
        };
        let status = if message.is_provisional() { " (sending)" } else { "" };

        println!(
            "[{}] {who}: {}{status}",
            message.created_at.with_timezone(&chrono::Local).format("%H:%M"),
            message.body
        );
    }
}

fn report(event: SessionEvent) {
    match event {
        SessionEvent::LoadFailed(e) => {
            eprintln!("Failed to load messages: {}", e.user_message());
        }
        SessionEvent::SendFailed { text, error } => {
            eprintln!("Send failed: {}", error.user_message());
            eprintln!("Not delivered, enter it again to retry: {text}");
        }
    }
}
