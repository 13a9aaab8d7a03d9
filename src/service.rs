use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::catalog::ProductCatalog;
use crate::config::Config;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::metrics;
use crate::models::{
    Address, CheckoutSessionCompleteRequest, CheckoutSessionCreateRequest,
    CheckoutSessionUpdateRequest, FulfillmentConfig, Links, LineItemInput, OrderView,
    PaymentConfig, PaymentData, SessionView, TotalEntry,
};
use crate::orders::OrderService;
use crate::payment::{PaymentProcessor, PipelineError};
use crate::session::{CheckoutSession, ItemInfo, LineItem, SessionStatus};
use crate::shipping::ShippingCalculator;
use crate::store::{SessionRepository, StoredSession};
use crate::tax::TaxCalculator;
use crate::validation;

/// Orchestrates the checkout session lifecycle: creation, updates,
/// completion with payment, and cancellation.
#[derive(Clone)]
pub struct CheckoutService {
    repository: SessionRepository,
    catalog: ProductCatalog,
    shipping: ShippingCalculator,
    tax: TaxCalculator,
    orders: OrderService,
    processor: Arc<PaymentProcessor>,
    events: EventSender,
    config: Config,
}

impl CheckoutService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository: SessionRepository,
        catalog: ProductCatalog,
        shipping: ShippingCalculator,
        tax: TaxCalculator,
        orders: OrderService,
        processor: Arc<PaymentProcessor>,
        events: EventSender,
        config: Config,
    ) -> Self {
        Self {
            repository,
            catalog,
            shipping,
            tax,
            orders,
            processor,
            events,
            config,
        }
    }

    #[instrument(skip(self, request))]
    pub async fn create_session(
        &self,
        request: CheckoutSessionCreateRequest,
    ) -> Result<SessionView, ServiceError> {
        if request.line_items.is_empty() {
            return Err(ServiceError::validation(
                "line_items",
                "At least one line item is required",
            ));
        }

        let currency = request
            .currency
            .unwrap_or_else(|| self.config.currency.clone());
        validation::validate_currency(&currency)?;

        let line_items = self.build_line_items(&request.line_items)?;

        let stock_errors = self.catalog.verify_stock(&line_items);
        if !stock_errors.is_empty() {
            return Err(ServiceError::Validation(stock_errors));
        }

        let session = CheckoutSession::create(
            line_items,
            currency,
            self.config.session_expiry_minutes,
        );
        self.repository.save(&session).await?;

        metrics::CHECKOUT_SESSIONS_CREATED.inc();
        info!("Created checkout session {}", session.id);

        if let Err(e) = self
            .events
            .send(Event::CheckoutStarted {
                session_id: session.id.clone(),
            })
            .await
        {
            warn!("Failed to send checkout started event: {}", e);
        }

        Ok(self.build_view(&session))
    }

    #[instrument(skip(self))]
    pub async fn get_session(&self, session_id: &str) -> Result<SessionView, ServiceError> {
        let stored = self.find(session_id).await?;
        Ok(self.build_view(&stored.session))
    }

    #[instrument(skip(self, request))]
    pub async fn update_session(
        &self,
        session_id: &str,
        request: CheckoutSessionUpdateRequest,
    ) -> Result<SessionView, ServiceError> {
        let stored = self.find(session_id).await?;
        let mut session = stored.session.clone();

        if !session.can_update() {
            return Err(if session.is_expired() && session.can_cancel() {
                ServiceError::SessionExpired
            } else {
                ServiceError::InvalidStatus {
                    current: session.status,
                }
            });
        }

        if let Some(inputs) = &request.line_items {
            if inputs.is_empty() {
                return Err(ServiceError::validation(
                    "line_items",
                    "At least one line item is required",
                ));
            }
            session.line_items = self.build_line_items(inputs)?;

            let stock_errors = self.catalog.verify_stock(&session.line_items);
            if !stock_errors.is_empty() {
                return Err(ServiceError::Validation(stock_errors));
            }
        }

        if let Some(address) = request.shipping_address {
            self.validate_address(&address)?;
            session.shipping_address = Some(address);
        }

        if let Some(method_id) = request.selected_shipping_method {
            if session.shipping_address.is_none() {
                return Err(ServiceError::validation(
                    "shipping_address",
                    "A shipping address is required before selecting a shipping method",
                ));
            }
            session.selected_shipping_method = Some(method_id);
        }

        self.recalculate(&mut session)?;

        self.repository.save(&session).await?;
        metrics::CHECKOUT_SESSIONS_UPDATED.inc();

        if let Err(e) = self
            .events
            .send(Event::CheckoutUpdated {
                session_id: session.id.clone(),
            })
            .await
        {
            warn!("Failed to send checkout updated event: {}", e);
        }

        Ok(self.build_view(&session))
    }

    /// Completion workflow. The session is claimed with a conditional write
    /// of `complete_in_progress` before any money moves; a concurrent
    /// completion loses that write and is rejected. A failed payment rolls
    /// the session back to `incomplete` so the buyer can retry.
    #[instrument(skip(self, request))]
    pub async fn complete_session(
        &self,
        session_id: &str,
        request: CheckoutSessionCompleteRequest,
    ) -> Result<SessionView, ServiceError> {
        let stored = self.find(session_id).await?;
        let mut session = stored.session.clone();
        let status_before = session.status;

        if !session.can_complete() {
            return Err(if session.is_expired() && session.can_cancel() {
                ServiceError::SessionExpired
            } else {
                ServiceError::InvalidStatus {
                    current: session.status,
                }
            });
        }

        if let Some(address) = request.shipping_address {
            self.validate_address(&address)?;
            session.shipping_address = Some(address);
            self.recalculate(&mut session)?;
        }

        let shipping_address = session.shipping_address.clone().ok_or_else(|| {
            ServiceError::validation("shipping_address", "A shipping address is required")
        })?;

        let payment_data = request
            .payment_data
            .or_else(|| session.payment_data.clone())
            .ok_or_else(|| {
                ServiceError::validation("payment_data", "Payment data is required")
            })?;
        self.validate_payment_data(&payment_data)?;

        let stock_errors = self.catalog.verify_stock(&session.line_items);
        if !stock_errors.is_empty() {
            return Err(ServiceError::Validation(stock_errors));
        }

        // Claim the session. Losing the swap means another completion (or a
        // concurrent update) got there first.
        session.mark_complete_in_progress();
        session.payment_data = Some(payment_data.clone());
        if !self.repository.save_if_unchanged(&stored, &session).await? {
            let current = self
                .find(session_id)
                .await
                .map(|s| s.session.status)
                .unwrap_or(SessionStatus::CompleteInProgress);
            return Err(ServiceError::InvalidStatus { current });
        }

        let order = self.orders.create_pending(&session, shipping_address)?;

        match self.processor.process(&order, &payment_data) {
            Ok(result) if result.success => {
                self.orders
                    .mark_paid(&order.id, result.transaction_id.clone())?;
                self.catalog.reduce_stock(&order);

                session.mark_completed(order.id.clone());
                self.repository.save(&session).await?;

                metrics::CHECKOUT_COMPLETIONS.inc();
                metrics::PAYMENT_PROCESSING_SUCCESS.inc();
                info!(
                    "Completed checkout session {} with order {}",
                    session.id, order.id
                );

                if let Err(e) = self
                    .events
                    .send(Event::CheckoutCompleted {
                        session_id: session.id.clone(),
                        order_id: order.id.clone(),
                    })
                    .await
                {
                    warn!("Failed to send checkout completed event: {}", e);
                }

                Ok(self.build_view(&session))
            }
            Ok(result) => {
                self.orders.mark_failed(&order.id, &result.message)?;
                self.rollback(&mut session, SessionStatus::Incomplete)
                    .await?;

                metrics::PAYMENT_PROCESSING_FAILURE.inc();
                if let Err(e) = self
                    .events
                    .send(Event::PaymentFailed {
                        session_id: session.id.clone(),
                        order_id: order.id.clone(),
                        reason: result.message.clone(),
                    })
                    .await
                {
                    warn!("Failed to send payment failed event: {}", e);
                }

                Err(ServiceError::PaymentFailed(result.message))
            }
            Err(err @ (PipelineError::NoGateway(_) | PipelineError::NoHandler(_))) => {
                // Nothing was attempted against a gateway; the session goes
                // back to exactly where it was.
                self.orders.mark_failed(&order.id, &err.to_string())?;
                self.rollback(&mut session, status_before).await?;
                Err(ServiceError::NoGatewayAvailable(err.to_string()))
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn cancel_session(&self, session_id: &str) -> Result<SessionView, ServiceError> {
        let stored = self.find(session_id).await?;
        let mut session = stored.session.clone();

        if !session.can_cancel() {
            return Err(ServiceError::InvalidStatus {
                current: session.status,
            });
        }

        session.mark_canceled();
        self.repository.save(&session).await?;
        metrics::CHECKOUT_CANCELLATIONS.inc();
        info!("Canceled checkout session {}", session.id);

        if let Err(e) = self
            .events
            .send(Event::CheckoutCanceled {
                session_id: session.id.clone(),
            })
            .await
        {
            warn!("Failed to send checkout canceled event: {}", e);
        }

        Ok(self.build_view(&session))
    }

    async fn find(&self, session_id: &str) -> Result<StoredSession, ServiceError> {
        self.repository.find(session_id).await?.ok_or_else(|| {
            ServiceError::NotFound(format!("Checkout session {} not found", session_id))
        })
    }

    async fn rollback(
        &self,
        session: &mut CheckoutSession,
        status: SessionStatus,
    ) -> Result<(), ServiceError> {
        session.revert_to(status);
        self.repository.save(session).await?;
        metrics::SESSION_ROLLBACKS.inc();
        warn!(
            "Rolled back checkout session {} to {}",
            session.id, session.status
        );
        Ok(())
    }

    fn build_line_items(&self, inputs: &[LineItemInput]) -> Result<Vec<LineItem>, ServiceError> {
        let mut line_items = Vec::with_capacity(inputs.len());

        for (index, input) in inputs.iter().enumerate() {
            validation::validate_quantity(
                input.quantity as i64,
                &format!("line_items.{}.quantity", index),
            )?;

            let product = self.catalog.get_product(&input.item.id).map_err(|_| {
                ServiceError::validation(
                    format!("line_items.{}.item.id", index),
                    format!("Product not found: {}", input.item.id),
                )
            })?;

            let subtotal = product.price * input.quantity as i64;
            line_items.push(LineItem {
                item: ItemInfo {
                    id: product.id,
                    title: product.title,
                    unit_price: product.price,
                    image: product.image_url,
                },
                quantity: input.quantity,
                totals: vec![TotalEntry::new("subtotal", subtotal)],
            });
        }

        Ok(line_items)
    }

    fn validate_address(&self, address: &Address) -> Result<(), ServiceError> {
        validation::validate_input(address, "shipping_address")?;
        validation::validate_country_code(&address.country)?;
        if let Some(email) = &address.email {
            validation::validate_email(email)?;
        }
        if let Some(phone) = &address.phone {
            validation::validate_phone(phone)?;
        }
        Ok(())
    }

    fn validate_payment_data(&self, payment_data: &PaymentData) -> Result<(), ServiceError> {
        if payment_data.handler_id.is_empty() {
            return Err(ServiceError::validation(
                "payment_data.handler_id",
                "A payment handler id is required",
            ));
        }

        // A non-empty credential is required for every handler id; token
        // format checks stay in each handler's prepare phase.
        let token = payment_data
            .credential
            .as_ref()
            .map(|c| c.token.as_str())
            .unwrap_or("");
        if token.is_empty() {
            return Err(ServiceError::validation(
                "payment_data.credential",
                "A payment credential is required",
            ));
        }

        Ok(())
    }

    /// Recompute shipping methods, selection, and derived amounts after any
    /// mutation of line items or address. An invalid or missing selection
    /// falls back to the first available method.
    fn recalculate(&self, session: &mut CheckoutSession) -> Result<(), ServiceError> {
        let address = match &session.shipping_address {
            Some(address) => address.clone(),
            None => {
                session.available_shipping_methods = Vec::new();
                session.selected_shipping_method = None;
                session.calculated_shipping = 0;
                session.calculated_tax = 0;
                return Ok(());
            }
        };

        let methods = self
            .shipping
            .available_methods(&address, &session.line_items);

        let selected_valid = session
            .selected_shipping_method
            .as_ref()
            .map(|id| methods.iter().any(|m| &m.id == id))
            .unwrap_or(false);
        if !selected_valid {
            session.selected_shipping_method = methods.first().map(|m| m.id.clone());
        }

        session.calculated_shipping = session
            .selected_shipping_method
            .as_ref()
            .and_then(|id| methods.iter().find(|m| &m.id == id))
            .map(|m| m.amount)
            .unwrap_or(0);

        let subtotal: i64 = session.line_items.iter().map(LineItem::subtotal).sum();
        session.calculated_tax =
            self.tax
                .calculate(subtotal, session.calculated_shipping, &address);

        session.available_shipping_methods = methods;
        Ok(())
    }

    fn build_view(&self, session: &CheckoutSession) -> SessionView {
        let fulfillment = if session.shipping_address.is_some() {
            Some(FulfillmentConfig {
                options: session.available_shipping_methods.clone(),
                selected: session.selected_shipping_method.clone(),
            })
        } else {
            None
        };

        let order = session.order_id.as_ref().map(|order_id| OrderView {
            id: order_id.clone(),
            status: "confirmed".to_string(),
        });

        SessionView {
            id: session.id.clone(),
            status: session.status,
            line_items: session.line_items.clone(),
            currency: session.currency.clone(),
            totals: session.calculate_totals(),
            payment: PaymentConfig {
                handlers: self.processor.available_handlers(),
            },
            links: Links {
                privacy_policy: format!("{}/privacy", self.config.base_url),
                terms_of_service: format!("{}/terms", self.config.base_url),
            },
            expires_at: session.expires_at,
            fulfillment,
            order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Credential, ItemRef};
    use crate::payment::{GatewayProvider, HandlerRegistry};
    use crate::store::MemoryStore;
    use assert_matches::assert_matches;
    use std::time::Duration;

    fn service() -> CheckoutService {
        let store = Arc::new(MemoryStore::new());
        let repository = SessionRepository::new(store, Duration::from_secs(3600));
        let catalog = ProductCatalog::new();
        let (tx, mut rx) = tokio::sync::mpsc::channel(64);
        tokio::spawn(async move { while rx.recv().await.is_some() {} });

        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            log_level: "debug".to_string(),
            currency: "USD".to_string(),
            session_expiry_minutes: 360,
            store_ttl_secs: 3600,
            redis_url: None,
            base_url: "http://localhost:8080".to_string(),
        };

        CheckoutService::new(
            repository,
            catalog.clone(),
            ShippingCalculator::new(catalog.clone()),
            TaxCalculator::new(),
            OrderService::new(),
            Arc::new(PaymentProcessor::new(
                GatewayProvider::with_defaults(),
                HandlerRegistry::new(),
            )),
            EventSender::new(tx),
            config,
        )
    }

    fn create_request() -> CheckoutSessionCreateRequest {
        CheckoutSessionCreateRequest {
            line_items: vec![LineItemInput {
                item: ItemRef {
                    id: "test".to_string(),
                },
                quantity: 2,
            }],
            currency: None,
        }
    }

    fn address() -> Address {
        Address {
            name: Some("Test Buyer".to_string()),
            line1: "123 Main St".to_string(),
            line2: None,
            city: "San Francisco".to_string(),
            region: Some("CA".to_string()),
            postal_code: "94105".to_string(),
            country: "US".to_string(),
            phone: None,
            email: None,
        }
    }

    fn payment(token: &str) -> PaymentData {
        PaymentData {
            handler_id: "ucp_stripe".to_string(),
            credential: Some(Credential {
                token: token.to_string(),
                card_brand: None,
                card_last_four: None,
            }),
        }
    }

    #[tokio::test]
    async fn create_resolves_catalog_prices() {
        let service = service();
        let view = service.create_session(create_request()).await.unwrap();

        assert_eq!(view.status, SessionStatus::Incomplete);
        assert_eq!(view.line_items[0].item.unit_price, 500);
        assert_eq!(view.totals.last().unwrap().amount, 1000);
        assert_eq!(view.payment.handlers[0].id, "ucp_agent");
    }

    #[tokio::test]
    async fn create_rejects_unknown_products() {
        let service = service();
        let err = service
            .create_session(CheckoutSessionCreateRequest {
                line_items: vec![LineItemInput {
                    item: ItemRef {
                        id: "nope".to_string(),
                    },
                    quantity: 1,
                }],
                currency: None,
            })
            .await
            .unwrap_err();

        assert_matches!(err, ServiceError::Validation(fields) => {
            assert_eq!(fields[0].param, "line_items.0.item.id");
        });
    }

    #[tokio::test]
    async fn update_with_address_selects_shipping_and_stays_updatable() {
        let service = service();
        let created = service.create_session(create_request()).await.unwrap();

        let view = service
            .update_session(
                &created.id,
                CheckoutSessionUpdateRequest {
                    line_items: None,
                    shipping_address: Some(address()),
                    selected_shipping_method: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(view.status, SessionStatus::Incomplete);
        let fulfillment = view.fulfillment.unwrap();
        assert_eq!(fulfillment.selected.as_deref(), Some("standard_shipping"));
        assert!(view.totals.iter().any(|t| t.total_type == "shipping"));
        assert!(view.totals.iter().any(|t| t.total_type == "tax"));

        // The session stays updatable: a later update can still switch the
        // shipping method.
        let view = service
            .update_session(
                &created.id,
                CheckoutSessionUpdateRequest {
                    line_items: None,
                    shipping_address: None,
                    selected_shipping_method: Some("express_shipping".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(
            view.fulfillment.unwrap().selected.as_deref(),
            Some("express_shipping")
        );
    }

    #[tokio::test]
    async fn full_happy_path_completes_with_order() {
        let service = service();
        let created = service.create_session(create_request()).await.unwrap();
        service
            .update_session(
                &created.id,
                CheckoutSessionUpdateRequest {
                    line_items: None,
                    shipping_address: Some(address()),
                    selected_shipping_method: None,
                },
            )
            .await
            .unwrap();

        let view = service
            .complete_session(
                &created.id,
                CheckoutSessionCompleteRequest {
                    payment_data: Some(payment("pm_ok")),
                    shipping_address: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(view.status, SessionStatus::Completed);
        let order = view.order.unwrap();
        assert!(order.id.starts_with("ucp_order_"));
        assert_eq!(order.status, "confirmed");
    }

    #[tokio::test]
    async fn completed_sessions_reject_second_completion() {
        let service = service();
        let created = service.create_session(create_request()).await.unwrap();
        let complete = CheckoutSessionCompleteRequest {
            payment_data: Some(payment("pm_ok")),
            shipping_address: Some(address()),
        };

        service
            .complete_session(&created.id, complete.clone())
            .await
            .unwrap();

        let err = service
            .complete_session(&created.id, complete)
            .await
            .unwrap_err();
        assert_matches!(
            err,
            ServiceError::InvalidStatus {
                current: SessionStatus::Completed
            }
        );
    }

    #[tokio::test]
    async fn missing_credential_is_a_field_error() {
        let service = service();
        let created = service.create_session(create_request()).await.unwrap();

        let err = service
            .complete_session(
                &created.id,
                CheckoutSessionCompleteRequest {
                    payment_data: Some(PaymentData {
                        handler_id: "ucp_stripe".to_string(),
                        credential: None,
                    }),
                    shipping_address: Some(address()),
                },
            )
            .await
            .unwrap_err();

        assert_matches!(err, ServiceError::Validation(fields) => {
            assert_eq!(fields[0].param, "payment_data.credential");
        });
    }

    #[tokio::test]
    async fn offline_handlers_also_require_a_credential() {
        let service = service();
        let created = service.create_session(create_request()).await.unwrap();

        let err = service
            .complete_session(
                &created.id,
                CheckoutSessionCompleteRequest {
                    payment_data: Some(PaymentData {
                        handler_id: "cod".to_string(),
                        credential: None,
                    }),
                    shipping_address: Some(address()),
                },
            )
            .await
            .unwrap_err();

        assert_matches!(err, ServiceError::Validation(fields) => {
            assert_eq!(fields[0].param, "payment_data.credential");
        });
        assert!(service.orders.orders_for_session(&created.id).is_empty());
    }

    #[tokio::test]
    async fn declined_payment_rolls_back_to_incomplete() {
        let service = service();
        let created = service.create_session(create_request()).await.unwrap();

        let err = service
            .complete_session(
                &created.id,
                CheckoutSessionCompleteRequest {
                    payment_data: Some(payment("pm_declined")),
                    shipping_address: Some(address()),
                },
            )
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::PaymentFailed(_));

        let view = service.get_session(&created.id).await.unwrap();
        assert_eq!(view.status, SessionStatus::Incomplete);

        // Retry succeeds against the rolled-back session.
        let completed = service
            .complete_session(
                &created.id,
                CheckoutSessionCompleteRequest {
                    payment_data: Some(payment("pm_ok")),
                    shipping_address: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(completed.status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn unknown_handler_preserves_session_status() {
        let service = service();
        let created = service.create_session(create_request()).await.unwrap();
        service
            .update_session(
                &created.id,
                CheckoutSessionUpdateRequest {
                    line_items: None,
                    shipping_address: Some(address()),
                    selected_shipping_method: None,
                },
            )
            .await
            .unwrap();

        let err = service
            .complete_session(
                &created.id,
                CheckoutSessionCompleteRequest {
                    payment_data: Some(PaymentData {
                        handler_id: "ucp_bitcoin".to_string(),
                        credential: Some(Credential {
                            token: "tok_ok".to_string(),
                            card_brand: None,
                            card_last_four: None,
                        }),
                    }),
                    shipping_address: None,
                },
            )
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::NoGatewayAvailable(_));

        let view = service.get_session(&created.id).await.unwrap();
        assert_eq!(view.status, SessionStatus::Incomplete);
    }

    #[tokio::test]
    async fn canceled_sessions_are_terminal() {
        let service = service();
        let created = service.create_session(create_request()).await.unwrap();

        let view = service.cancel_session(&created.id).await.unwrap();
        assert_eq!(view.status, SessionStatus::Canceled);

        let err = service.cancel_session(&created.id).await.unwrap_err();
        assert_matches!(err, ServiceError::InvalidStatus { .. });
    }

    #[tokio::test]
    async fn failed_completion_does_not_double_materialize() {
        let service = service();
        let created = service.create_session(create_request()).await.unwrap();

        let _ = service
            .complete_session(
                &created.id,
                CheckoutSessionCompleteRequest {
                    payment_data: Some(payment("pm_declined")),
                    shipping_address: Some(address()),
                },
            )
            .await;
        service
            .complete_session(
                &created.id,
                CheckoutSessionCompleteRequest {
                    payment_data: Some(payment("pm_ok")),
                    shipping_address: None,
                },
            )
            .await
            .unwrap();

        let orders = service.orders.orders_for_session(&created.id);
        assert_eq!(orders.len(), 2);
        assert_eq!(
            orders
                .iter()
                .filter(|o| o.status == crate::orders::OrderStatus::Paid)
                .count(),
            1
        );
    }
}
