// Admin-defined per-guild text commands. A command is just a (name ->
// response) row; dispatch happens on every message that starts with the
// guild prefix, and `{user}` in the response is replaced with the
// invoker's mention at send time.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomCommand {
    pub name: String,
    pub response: String,
}

#[derive(Debug, Error)]
pub enum CustomCommandError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Command names must be alphanumeric")]
    InvalidName,
}

#[async_trait]
pub trait CommandStore: Send + Sync {
    /// Insert or overwrite. Unique per (guild, name).
    async fn upsert(
        &self,
        guild_id: u64,
        name: &str,
        response: &str,
    ) -> Result<(), CustomCommandError>;

    /// Returns true when the command existed and was removed.
    async fn remove(&self, guild_id: u64, name: &str) -> Result<bool, CustomCommandError>;

    async fn get(&self, guild_id: u64, name: &str)
        -> Result<Option<CustomCommand>, CustomCommandError>;

    async fn list(&self, guild_id: u64) -> Result<Vec<CustomCommand>, CustomCommandError>;
}

/// Extract the command name from a prefixed message, lowercased.
/// Returns None when the message does not start with the prefix.
pub fn parse_invocation(content: &str, prefix: &str) -> Option<String> {
    let trimmed = content.trim();
    let rest = trimmed.strip_prefix(prefix)?;
    let name = rest.split_whitespace().next()?;
    Some(name.to_lowercase())
}

/// Substitute the `{user}` placeholder with the invoker's mention.
pub fn render_response(response: &str, mention: &str) -> String {
    response.replace("{user}", mention)
}

pub struct CustomCommandService<S: CommandStore> {
    store: S,
}

impl<S: CommandStore> CustomCommandService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn validate_name(name: &str) -> Result<String, CustomCommandError> {
        let name = name.to_lowercase();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CustomCommandError::InvalidName);
        }
        Ok(name)
    }

    pub async fn add(
        &self,
        guild_id: u64,
        name: &str,
        response: &str,
    ) -> Result<(), CustomCommandError> {
        let name = Self::validate_name(name)?;
        self.store.upsert(guild_id, &name, response).await
    }

    pub async fn remove(&self, guild_id: u64, name: &str) -> Result<bool, CustomCommandError> {
        self.store.remove(guild_id, &name.to_lowercase()).await
    }

    pub async fn list(&self, guild_id: u64) -> Result<Vec<CustomCommand>, CustomCommandError> {
        self.store.list(guild_id).await
    }

    /// Full dispatch: parse the invocation, look the name up, render the
    /// response. None when the message is not a known custom command.
    pub async fn dispatch(
        &self,
        guild_id: u64,
        content: &str,
        prefix: &str,
        invoker_mention: &str,
    ) -> Result<Option<String>, CustomCommandError> {
        let Some(name) = parse_invocation(content, prefix) else {
            return Ok(None);
        };
        let Some(command) = self.store.get(guild_id, &name).await? else {
            return Ok(None);
        };
        Ok(Some(render_response(&command.response, invoker_mention)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;

    struct MemoryCommandStore {
        commands: DashMap<(u64, String), String>,
    }

    impl MemoryCommandStore {
        fn new() -> Self {
            Self {
                commands: DashMap::new(),
            }
        }
    }

    #[async_trait]
    impl CommandStore for MemoryCommandStore {
        async fn upsert(
            &self,
            guild_id: u64,
            name: &str,
            response: &str,
        ) -> Result<(), CustomCommandError> {
            self.commands
                .insert((guild_id, name.to_string()), response.to_string());
            Ok(())
        }

        async fn remove(&self, guild_id: u64, name: &str) -> Result<bool, CustomCommandError> {
            Ok(self
                .commands
                .remove(&(guild_id, name.to_string()))
                .is_some())
        }

        async fn get(
            &self,
            guild_id: u64,
            name: &str,
        ) -> Result<Option<CustomCommand>, CustomCommandError> {
            Ok(self
                .commands
                .get(&(guild_id, name.to_string()))
                .map(|r| CustomCommand {
                    name: name.to_string(),
                    response: r.clone(),
                }))
        }

        async fn list(&self, guild_id: u64) -> Result<Vec<CustomCommand>, CustomCommandError> {
            Ok(self
                .commands
                .iter()
                .filter(|e| e.key().0 == guild_id)
                .map(|e| CustomCommand {
                    name: e.key().1.clone(),
                    response: e.value().clone(),
                })
                .collect())
        }
    }

    #[test]
    fn invocation_parsing() {
        assert_eq!(parse_invocation("!hello there", "!"), Some("hello".into()));
        assert_eq!(parse_invocation("  !HELLO", "!"), Some("hello".into()));
        assert_eq!(parse_invocation("hello", "!"), None);
        assert_eq!(parse_invocation("?hello", "!"), None);
        assert_eq!(parse_invocation("!", "!"), None);
    }

    #[test]
    fn placeholder_substitution() {
        assert_eq!(
            render_response("Welcome, {user}!", "<@42>"),
            "Welcome, <@42>!"
        );
        assert_eq!(render_response("No placeholder", "<@42>"), "No placeholder");
    }

    #[tokio::test]
    async fn add_then_dispatch_returns_substituted_response() {
        let service = CustomCommandService::new(MemoryCommandStore::new());
        service.add(1, "greet", "Hi {user}!").await.unwrap();

        let reply = service
            .dispatch(1, "!greet", "!", "<@7>")
            .await
            .unwrap()
            .expect("command should resolve");
        assert_eq!(reply, "Hi <@7>!");
    }

    #[tokio::test]
    async fn removed_commands_no_longer_dispatch() {
        let service = CustomCommandService::new(MemoryCommandStore::new());
        service.add(1, "greet", "Hi {user}!").await.unwrap();
        assert!(service.remove(1, "greet").await.unwrap());
        assert!(service
            .dispatch(1, "!greet", "!", "<@7>")
            .await
            .unwrap()
            .is_none());
        assert!(!service.remove(1, "greet").await.unwrap());
    }

    #[tokio::test]
    async fn names_are_case_insensitive_and_validated() {
        let service = CustomCommandService::new(MemoryCommandStore::new());
        service.add(1, "Greet", "hi").await.unwrap();
        assert!(service
            .dispatch(1, "!GREET", "!", "<@7>")
            .await
            .unwrap()
            .is_some());

        assert!(matches!(
            service.add(1, "bad name", "hi").await,
            Err(CustomCommandError::InvalidName)
        ));
        assert!(matches!(
            service.add(1, "", "hi").await,
            Err(CustomCommandError::InvalidName)
        ));
    }

    #[tokio::test]
    async fn commands_are_scoped_per_guild() {
        let service = CustomCommandService::new(MemoryCommandStore::new());
        service.add(1, "greet", "hi").await.unwrap();
        assert!(service
            .dispatch(2, "!greet", "!", "<@7>")
            .await
            .unwrap()
            .is_none());
    }
}
