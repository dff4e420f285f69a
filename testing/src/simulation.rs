//! Randomized collaborator simulations for demo deployments.
//!
//! Each simulation answers after a random delay and fails a configurable
//! fraction of calls, either with a transport error or with a business
//! rejection. The service binary wires these in place of real collaborators,
//! which keeps the whole saga runnable (and its failure paths observable)
//! without any external infrastructure.

use orderflow_core::order::Order;
use orderflow_core::services::{
    AntiFraudService, OrderCheck, PaymentService, ServiceError, UserService, WarehouseService,
};
use rand::Rng;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use uuid::Uuid;

const PAYMENT_REJECTIONS: &[&str] = &[
    "insufficient funds on card",
    "card has expired",
    "card limit exceeded",
    "payment rejected due to fraud suspicion",
    "invalid card details",
    "payment declined by issuing bank",
];

const ORDER_REJECTIONS: &[&str] = &[
    "suspicious user behaviour",
    "unusual order frequency",
    "user has a history of suspicious activity",
];

/// Knobs shared by all simulations.
#[derive(Debug, Clone, Copy)]
pub struct SimulationProfile {
    /// Fraction of calls that pass the business check.
    pub success_rate: f64,
    /// Mean response delay; actual delay is uniform in `0..2 * avg_delay`.
    pub avg_delay: Duration,
    /// Fraction of calls that fail with a transport error.
    pub network_error_rate: f64,
}

impl SimulationProfile {
    async fn simulate_latency(&self) {
        let upper = (self.avg_delay * 2).as_millis().max(1);
        let delay = {
            let mut rng = rand::thread_rng();
            rng.gen_range(0..upper)
        };
        let millis = u64::try_from(delay).unwrap_or(u64::MAX);
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }

    fn network_error(&self, service: &str) -> Option<ServiceError> {
        if rand::thread_rng().gen_bool(self.network_error_rate) {
            Some(ServiceError::Unavailable(format!(
                "{service} is not available"
            )))
        } else {
            None
        }
    }

    fn succeeds(&self) -> bool {
        rand::thread_rng().gen_bool(self.success_rate)
    }
}

/// Warehouse simulation: mostly in stock, occasionally unreachable.
pub struct SimulatedWarehouse {
    /// Behaviour knobs.
    pub profile: SimulationProfile,
}

impl Default for SimulatedWarehouse {
    fn default() -> Self {
        Self {
            profile: SimulationProfile {
                success_rate: 0.9,
                avg_delay: Duration::from_millis(500),
                network_error_rate: 0.05,
            },
        }
    }
}

impl WarehouseService for SimulatedWarehouse {
    fn check_product_availability(
        &self,
        _product_id: Uuid,
        _amount: i64,
    ) -> Pin<Box<dyn Future<Output = Result<bool, ServiceError>> + Send + '_>> {
        Box::pin(async move {
            self.profile.simulate_latency().await;
            if let Some(err) = self.profile.network_error("warehouse service") {
                return Err(err);
            }
            Ok(self.profile.succeeds())
        })
    }
}

/// Anti-fraud simulation: flags large orders more often.
pub struct SimulatedAntiFraud {
    /// Behaviour knobs.
    pub profile: SimulationProfile,
}

impl Default for SimulatedAntiFraud {
    fn default() -> Self {
        Self {
            profile: SimulationProfile {
                success_rate: 0.85,
                avg_delay: Duration::from_millis(600),
                network_error_rate: 0.03,
            },
        }
    }
}

impl AntiFraudService for SimulatedAntiFraud {
    fn check_user_credit_limit(
        &self,
        _user_id: Uuid,
    ) -> Pin<Box<dyn Future<Output = Result<bool, ServiceError>> + Send + '_>> {
        Box::pin(async move {
            self.profile.simulate_latency().await;
            if let Some(err) = self.profile.network_error("anti-fraud service") {
                return Err(err);
            }
            Ok(self.profile.succeeds())
        })
    }

    fn check_order<'a>(
        &'a self,
        order: &'a Order,
    ) -> Pin<Box<dyn Future<Output = Result<OrderCheck, ServiceError>> + Send + 'a>> {
        Box::pin(async move {
            self.profile.simulate_latency().await;

            // Large orders face a stricter pass rate.
            let passed = if order.amount > 10_000 {
                rand::thread_rng().gen_bool(0.5)
            } else {
                self.profile.succeeds()
            };

            if passed {
                Ok(OrderCheck::passed())
            } else if order.amount > 10_000 {
                Ok(OrderCheck::failed("suspicious order amount"))
            } else {
                let reason = {
                    let mut rng = rand::thread_rng();
                    ORDER_REJECTIONS[rng.gen_range(0..ORDER_REJECTIONS.len())]
                };
                Ok(OrderCheck::failed(reason))
            }
        })
    }
}

/// User service simulation: almost always active.
pub struct SimulatedUser {
    /// Behaviour knobs.
    pub profile: SimulationProfile,
}

impl Default for SimulatedUser {
    fn default() -> Self {
        Self {
            profile: SimulationProfile {
                success_rate: 0.95,
                avg_delay: Duration::from_millis(100),
                network_error_rate: 0.02,
            },
        }
    }
}

impl UserService for SimulatedUser {
    fn check_user_status(
        &self,
        _user_id: Uuid,
    ) -> Pin<Box<dyn Future<Output = Result<bool, ServiceError>> + Send + '_>> {
        Box::pin(async move {
            self.profile.simulate_latency().await;
            if let Some(err) = self.profile.network_error("user service") {
                return Err(err);
            }
            Ok(self.profile.succeeds())
        })
    }
}

/// Payment simulation: settles most charges, rejects the rest with realistic
/// gateway messages.
pub struct SimulatedPayment {
    /// Behaviour knobs.
    pub profile: SimulationProfile,
}

impl Default for SimulatedPayment {
    fn default() -> Self {
        Self {
            profile: SimulationProfile {
                success_rate: 0.9,
                avg_delay: Duration::from_millis(500),
                network_error_rate: 0.05,
            },
        }
    }
}

impl PaymentService for SimulatedPayment {
    fn process_payment<'a>(
        &'a self,
        _order: &'a Order,
    ) -> Pin<Box<dyn Future<Output = Result<(), ServiceError>> + Send + 'a>> {
        Box::pin(async move {
            self.profile.simulate_latency().await;

            if rand::thread_rng().gen_bool(self.profile.network_error_rate) {
                return Err(ServiceError::Timeout(
                    "payment gateway network error: connection timeout".to_string(),
                ));
            }

            if self.profile.succeeds() {
                Ok(())
            } else {
                let rejection = {
                    let mut rng = rand::thread_rng();
                    PAYMENT_REJECTIONS[rng.gen_range(0..PAYMENT_REJECTIONS.len())]
                };
                Err(ServiceError::Rejected(rejection.to_string()))
            }
        })
    }
}
