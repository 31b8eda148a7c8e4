use std::sync::Arc;

use crate::domain::models::user::UserProfile;
use crate::domain::ports::{DocPath, DocumentStore, DocumentWatch};
use crate::error::AppError;

const COLLECTION: &str = "users";

pub struct UserWatch {
    inner: DocumentWatch,
}

impl UserWatch {
    pub async fn next(&mut self) -> Result<Option<UserProfile>, AppError> {
        match self.inner.next().await {
            None => Err(AppError::Store("user subscription closed".to_string())),
            Some(None) => Ok(None),
            Some(Some(value)) => Ok(Some(UserProfile::from_value(value)?)),
        }
    }

    pub fn cancel(self) {}
}

pub struct UserService {
    store: Arc<dyn DocumentStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn save_user(&self, user_id: &str, profile: &UserProfile) -> Result<(), AppError> {
        let path = DocPath::new(COLLECTION, user_id);
        self.store.set(&path, profile.to_value()?).await
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, AppError> {
        let path = DocPath::new(COLLECTION, user_id);
        match self.store.get(&path).await? {
            None => Ok(None),
            Some(value) => Ok(Some(UserProfile::from_value(value)?)),
        }
    }

    pub async fn watch_user(&self, user_id: &str) -> Result<UserWatch, AppError> {
        let path = DocPath::new(COLLECTION, user_id);
        let inner = self.store.watch(&path).await?;
        Ok(UserWatch { inner })
    }
}
