use serde::{Deserialize, Serialize};

/// Бэкенд, которому принадлежит запись
///
/// Заявка на возврат и возврат в ядре коммерции живут в разных сервисах и
/// обновляются независимо друг от друга.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Слой продавца (заявки на возврат)
    Vendor,
    /// Ядро коммерции (возвраты, заказы, склады)
    Commerce,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Vendor => "vendor",
            Origin::Commerce => "commerce",
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
