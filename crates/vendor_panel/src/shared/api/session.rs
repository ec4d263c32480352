use std::sync::{Arc, PoisonError, RwLock};

/// Почему сессия сброшена
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    /// Бэкенд ответил 401
    Unauthorized,
    /// Отказ в соединении при наличии токена: скорее всего, сессия истекла
    ConnectionRefused,
}

/// Переход на экран входа (в браузере это редирект, здесь подключаемый хук)
pub trait LoginRedirect: Send + Sync {
    fn redirect_to_login(&self, reason: LogoutReason);
}

/// Редирект по умолчанию: только пишет в лог
pub struct LogLoginRedirect;

impl LoginRedirect for LogLoginRedirect {
    fn redirect_to_login(&self, reason: LogoutReason) {
        tracing::warn!("Session ended ({:?}), login required", reason);
    }
}

/// Хранилище токена доступа.
///
/// Читать и менять состояние сессии может только шлюз; остальным компонентам
/// оно не выдаётся.
pub struct SessionStore {
    access_token: RwLock<Option<String>>,
    redirect: Arc<dyn LoginRedirect>,
}

impl SessionStore {
    pub fn new(redirect: Arc<dyn LoginRedirect>) -> Self {
        Self {
            access_token: RwLock::new(None),
            redirect,
        }
    }

    pub fn with_token(self, token: impl Into<String>) -> Self {
        self.save_access_token(token);
        self
    }

    pub(crate) fn save_access_token(&self, token: impl Into<String>) {
        let token = token.into();
        let mut guard = self
            .access_token
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = if token.trim().is_empty() { None } else { Some(token) };
    }

    pub(crate) fn access_token(&self) -> Option<String> {
        self.access_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn has_token(&self) -> bool {
        self.access_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Сбросить токен и отправить пользователя на вход
    pub(crate) fn expire(&self, reason: LogoutReason) {
        self.access_token
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.redirect.redirect_to_login(reason);
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Arc::new(LogLoginRedirect))
    }
}
