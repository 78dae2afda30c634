/// Names used when a transaction reports to the `metrics` facade.
#[derive(Copy, Clone, Debug)]
pub struct TransactionLabels {
    pub reqs: &'static str,
    pub failed: &'static str,
    pub duration: &'static str,
}

#[macro_export]
macro_rules! generate_labels {
    ($base_name:expr) => {
        ::floodgate::core::TransactionLabels {
            reqs: concat!("floodgate_", stringify!($base_name), "_reqs"),
            failed: concat!("floodgate_", stringify!($base_name), "_failed"),
            duration: concat!("floodgate_", stringify!($base_name), "_duration"),
        }
    };
}
