pub mod response;

pub use response::{RefundOutcome, RefundResult, ResumePoint};

use crate::usecases::common::UseCaseMetadata;

pub struct ReturnLifecycle;

impl UseCaseMetadata for ReturnLifecycle {
    fn usecase_index() -> &'static str {
        "u601"
    }

    fn usecase_name() -> &'static str {
        "return_lifecycle"
    }

    fn display_name() -> &'static str {
        "Обработка возврата"
    }

    fn description() -> &'static str {
        "Решение по заявке, приёмка товара и возврат денег"
    }
}
