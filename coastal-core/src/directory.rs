// Read-only access to the external contact directory

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::EngineResult;
use crate::model::Contact;

/// Source of contacts. The engine only ever reads from it; creating,
/// editing and deleting contacts belongs to the directory's owner.
#[async_trait]
pub trait ContactDirectory: Send + Sync {
    /// Full snapshot of the directory. Failures map to
    /// `EngineError::DirectoryUnavailable`.
    async fn list_contacts(&self) -> EngineResult<Vec<Contact>>;
}

/// Directory held in memory, used by the CLI simulator and in tests.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    contacts: RwLock<Vec<Contact>>,
}

impl InMemoryDirectory {
    pub fn new(contacts: Vec<Contact>) -> Self {
        Self {
            contacts: RwLock::new(contacts),
        }
    }

    /// Load contacts from a JSON array file.
    pub fn from_json_file<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        use anyhow::Context;

        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read contacts file {}", path.display()))?;
        let contacts: Vec<Contact> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse contacts file {}", path.display()))?;
        tracing::info!("Loaded {} contacts from {}", contacts.len(), path.display());
        Ok(Self::new(contacts))
    }

    pub async fn replace(&self, contacts: Vec<Contact>) {
        *self.contacts.write().await = contacts;
    }
}

#[async_trait]
impl ContactDirectory for InMemoryDirectory {
    async fn list_contacts(&self) -> EngineResult<Vec<Contact>> {
        Ok(self.contacts.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_replace_and_list() {
        let directory = InMemoryDirectory::default();
        assert!(directory.list_contacts().await.unwrap().is_empty());

        directory
            .replace(vec![Contact {
                id: 7,
                name: "Ravi".to_string(),
                phone: Some("+919800000007".to_string()),
                email: None,
                region: "Goa".to_string(),
            }])
            .await;

        let contacts = directory.list_contacts().await.unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].id, 7);
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id": 1, "name": "Meera", "email": "meera@example.org", "region": "Kochi, Kerala"}}]"#
        )
        .unwrap();

        let directory = InMemoryDirectory::from_json_file(file.path()).unwrap();
        let contacts = directory.contacts.try_read().unwrap();
        assert_eq!(contacts[0].region, "Kochi, Kerala");
        assert!(contacts[0].phone.is_none());
    }
}
