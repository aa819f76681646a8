use common::Result;
use room::RoomStore;
use std::fmt::Write;
use std::str::FromStr;

pub const USAGE: &str =
    "commands: rooms | listen <id> | unlisten <id> | assist | respond <id> | quit";

/// Interactive commands read from stdin while the node runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Rooms,
    Listen(String),
    Unlisten(String),
    RequestHelp,
    Respond(String),
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let verb = parts.next().ok_or_else(|| USAGE.to_string())?;
        let arg = parts.next().map(str::to_string);
        match (verb, arg) {
            ("rooms", None) => Ok(Command::Rooms),
            ("listen", Some(id)) => Ok(Command::Listen(id)),
            ("unlisten", Some(id)) => Ok(Command::Unlisten(id)),
            ("assist", None) => Ok(Command::RequestHelp),
            ("respond", Some(id)) => Ok(Command::Respond(id)),
            ("quit", None) | ("exit", None) => Ok(Command::Quit),
            _ => Err(USAGE.to_string()),
        }
    }
}

/// Runs a command and renders what the user should see.
pub async fn execute(store: &RoomStore, command: Command) -> Result<String> {
    let output = match command {
        Command::Rooms => render_rooms(store),
        Command::Listen(id) => match store.add_to_listening_to(&id).await? {
            Some(room) => format!("listening to {} at {}", room.device_id, room.location),
            None => format!("{} is not in discovery", id),
        },
        Command::Unlisten(id) => {
            if store.delete_listening_to(&id).await? {
                format!("stopped listening to {}", id)
            } else {
                format!("not listening to {}", id)
            }
        }
        Command::RequestHelp => {
            store.request_help().await?;
            "help requested".to_string()
        }
        Command::Respond(id) => {
            if store.respond_to_help(&id).await? {
                format!("responded to {}", id)
            } else {
                format!("{} is unknown or disconnected", id)
            }
        }
        Command::Quit => String::new(),
    };
    Ok(output)
}

fn render_rooms(store: &RoomStore) -> String {
    let registry = store.snapshot();
    let mut out = String::new();

    let _ = writeln!(out, "discovered:");
    for room in registry.discovered() {
        let _ = writeln!(out, "  {} {}", room.device_id, room.location);
    }
    let _ = writeln!(out, "listening to:");
    for room in registry.listened_rooms() {
        let mut flags = Vec::new();
        if room.disconnected {
            flags.push("disconnected");
        }
        if room.needs_assist {
            flags.push("needs assist");
        }
        let _ = writeln!(out, "  {} {} {}", room.device_id, room.location, flags.join(", "));
    }
    let _ = writeln!(out, "listeners:");
    for listener in registry.listeners() {
        let _ = writeln!(
            out,
            "  {} ({}) {}",
            listener.responder_name, listener.device_id, listener.location
        );
    }
    if let Some(responder) = registry.incoming_responder() {
        let _ = writeln!(out, "incoming responder: {}", responder);
    }
    if !registry.stored_listeners().is_empty() {
        let _ = writeln!(out, "history:");
        for stored in registry.stored_listeners() {
            let _ = writeln!(out, "  {} last seen {}", stored.name, stored.last_seen.to_rfc3339());
        }
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::NetworkLocation;
    use room::dispatcher::on_advertise_response;

    #[test]
    fn test_parse_commands() {
        assert_eq!("rooms".parse::<Command>(), Ok(Command::Rooms));
        assert_eq!("listen dev1".parse::<Command>(), Ok(Command::Listen("dev1".to_string())));
        assert_eq!("  quit ".parse::<Command>(), Ok(Command::Quit));
        assert!("listen".parse::<Command>().is_err());
        assert!("".parse::<Command>().is_err());
    }

    #[tokio::test]
    async fn test_rooms_lists_discovery() {
        let store = RoomStore::new();
        let location = NetworkLocation::new("10.0.0.5", 9000);
        store.update(|r| on_advertise_response(r, "dev1".into(), location));
        let output = execute(&store, Command::Rooms).await.unwrap();
        assert!(output.contains("dev1 10.0.0.5:9000"));
    }

    #[tokio::test]
    async fn test_listen_unknown_room() {
        let store = RoomStore::new();
        let output = execute(&store, Command::Listen("ghost".to_string())).await.unwrap();
        assert_eq!(output, "ghost is not in discovery");
    }
}
