use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::Actor;
use crate::error::{AppError, Result};
use crate::models::{validate_images, ServiceListing, UserRole};
use crate::repositories::ServiceRepository;

#[derive(Debug, Clone)]
pub struct CreateServiceListing {
    pub name: String,
    pub description: String,
    pub categories: Vec<String>,
    pub price_hour: Decimal,
    pub price_day: Decimal,
    pub images: Vec<String>,
}

/// Service listing catalog. Rating, review count and booking count on a
/// listing are derived fields owned by the review and booking services.
pub struct CatalogService {
    service_repo: ServiceRepository,
}

impl CatalogService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            service_repo: ServiceRepository::new(pool),
        }
    }

    pub async fn create_service(
        &self,
        actor: &Actor,
        input: CreateServiceListing,
    ) -> Result<ServiceListing> {
        if actor.role == UserRole::Customer {
            return Err(AppError::Forbidden(
                "only providers can create service listings".to_string(),
            ));
        }
        if input.price_hour <= Decimal::ZERO {
            return Err(AppError::InvalidAmount(
                "price_hour must be positive".to_string(),
            ));
        }
        validate_images(&input.images).map_err(AppError::Validation)?;

        let now = Utc::now();
        let service = ServiceListing {
            id: Uuid::new_v4(),
            provider_id: actor.id,
            name: input.name,
            description: input.description,
            categories: input.categories,
            price_hour: input.price_hour,
            price_day: input.price_day,
            images: input.images,
            rating: Decimal::ZERO,
            review_count: 0,
            booking_count: 0,
            active: true,
            created_at: now,
            updated_at: now,
        };

        self.service_repo.create(&service).await
    }

    pub async fn get_service(&self, id: Uuid) -> Result<ServiceListing> {
        self.service_repo.get(id).await
    }

    pub async fn list_services(
        &self,
        provider_id: Option<Uuid>,
        active_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ServiceListing>> {
        self.service_repo
            .list(provider_id, active_only, limit, offset)
            .await
    }
}
