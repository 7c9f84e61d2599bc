use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::WatchError;
use crate::models::{Frequency, NewWatch, UserId, Watch, WatchChanges, WatchId, WatchStatus};
use crate::services::schedule::ScanCadence;
use crate::storage::WatchRepository;

/// User-requested changes to a watch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatchPatch {
    pub frequency: Option<Frequency>,
    /// Only active, paused and expired can be requested.
    pub status: Option<WatchStatus>,
    pub partial_match: Option<bool>,
}

/// Creation, update and removal of watches on behalf of their owners
#[derive(Clone)]
pub struct WatchService {
    watches: Arc<dyn WatchRepository>,
    cadence: ScanCadence,
    max_active: usize,
}

impl WatchService {
    pub fn new(watches: Arc<dyn WatchRepository>, cadence: ScanCadence, max_active: usize) -> Self {
        Self {
            watches,
            cadence,
            max_active,
        }
    }

    /// Validate and store a new active watch.
    ///
    /// Nothing is written when validation fails or the owner already has the
    /// maximum number of active watches.
    pub async fn create(
        &self,
        user_id: &UserId,
        new: NewWatch,
        now: DateTime<Utc>,
    ) -> Result<Watch, WatchError> {
        validate(&new, now)?;

        let watch = Watch {
            id: WatchId::generate(),
            user_id: user_id.clone(),
            property_id: new.property_id.trim().to_string(),
            property_name: new.property_name.trim().to_string(),
            property_url: new.property_url.trim().to_string(),
            location: new.location.trim().to_string(),
            image_url: new.image_url,
            check_in_date: new.check_in_date,
            check_out_date: new.check_out_date,
            guests: new.guests,
            price: new.price,
            partial_match: new.partial_match,
            frequency: new.frequency,
            status: WatchStatus::Active,
            last_scanned_at: None,
            next_scan_at: Some(self.cadence.next_scan_at(new.frequency, now)),
            expires_at: Watch::expires_at_for(new.check_in_date),
            error_message: None,
            last_notification_sent: None,
            created_at: now,
            updated_at: now,
        };

        self.watches
            .insert_within_limit(watch.clone(), self.max_active)
            .await?;
        info!(
            watch_id = %watch.id,
            user_id = %user_id,
            frequency = %watch.frequency,
            next_scan_at = ?watch.next_scan_at,
            "Watch created"
        );
        Ok(watch)
    }

    pub async fn get(&self, user_id: &UserId, id: &WatchId) -> Result<Watch, WatchError> {
        let watch = self
            .watches
            .get(id)
            .await?
            .ok_or_else(|| WatchError::NotFound(id.clone()))?;
        if &watch.user_id != user_id {
            return Err(WatchError::NotOwner {
                watch: id.clone(),
                user: user_id.clone(),
            });
        }
        Ok(watch)
    }

    /// Owner's watches, newest first
    pub async fn list(&self, user_id: &UserId) -> Result<Vec<Watch>, WatchError> {
        Ok(self.watches.list_for_user(user_id).await?)
    }

    /// Apply an owner's changes.
    ///
    /// A new frequency reschedules from the last scan (or `now`); resuming
    /// to active reschedules from `now`. The active-watch limit only applies
    /// at creation.
    pub async fn update(
        &self,
        user_id: &UserId,
        id: &WatchId,
        patch: WatchPatch,
        now: DateTime<Utc>,
    ) -> Result<Watch, WatchError> {
        if patch.status == Some(WatchStatus::Error) {
            return Err(WatchError::Invalid(
                "status must be one of: active, paused, expired".to_string(),
            ));
        }

        let current = self.get(user_id, id).await?;
        let mut changes = WatchChanges {
            frequency: patch.frequency,
            status: patch.status,
            partial_match: patch.partial_match,
            updated_at: Some(now),
            ..Default::default()
        };

        if let Some(frequency) = patch.frequency {
            let base = current.last_scanned_at.unwrap_or(now);
            changes.next_scan_at = Some(Some(self.cadence.next_scan_at(frequency, base)));
        }
        match patch.status {
            Some(WatchStatus::Active) if current.status != WatchStatus::Active => {
                let frequency = patch.frequency.unwrap_or(current.frequency);
                changes.next_scan_at = Some(Some(self.cadence.next_scan_at(frequency, now)));
                changes.error_message = Some(None);
            }
            Some(WatchStatus::Expired) => changes.next_scan_at = Some(None),
            _ => {}
        }

        let mut updated = current;
        changes.apply(&mut updated);
        if !self.watches.update(id, changes).await? {
            return Err(WatchError::NotFound(id.clone()));
        }

        info!(watch_id = %id, status = %updated.status, frequency = %updated.frequency, "Watch updated");
        Ok(updated)
    }

    /// Hard delete; scan logs are kept.
    pub async fn delete(&self, user_id: &UserId, id: &WatchId) -> Result<(), WatchError> {
        self.get(user_id, id).await?;
        if !self.watches.delete(id).await? {
            return Err(WatchError::NotFound(id.clone()));
        }
        info!(watch_id = %id, user_id = %user_id, "Watch deleted");
        Ok(())
    }
}

fn validate(new: &NewWatch, now: DateTime<Utc>) -> Result<(), WatchError> {
    let required = [
        ("property name", &new.property_name),
        ("property URL", &new.property_url),
        ("location", &new.location),
    ];
    if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
        return Err(WatchError::Invalid(format!("{field} must not be empty")));
    }
    if new.guests < 1 {
        return Err(WatchError::Invalid("at least one guest is required".to_string()));
    }
    if new.check_in_date < now.date_naive() {
        return Err(WatchError::Invalid(
            "check-in date must be today or in the future".to_string(),
        ));
    }
    if new.check_out_date <= new.check_in_date {
        return Err(WatchError::Invalid(
            "check-out date must be after check-in date".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreResult;
    use crate::storage::LocalStore;
    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// LocalStore behind the default count-then-insert limit check, counting
    /// inserts
    struct CountingRepo {
        inner: LocalStore,
        inserts: AtomicUsize,
    }

    #[async_trait]
    impl WatchRepository for CountingRepo {
        async fn find_due(&self, now: DateTime<Utc>) -> StoreResult<Vec<Watch>> {
            self.inner.find_due(now).await
        }
        async fn get(&self, id: &WatchId) -> StoreResult<Option<Watch>> {
            self.inner.get(id).await
        }
        async fn update(&self, id: &WatchId, changes: WatchChanges) -> StoreResult<bool> {
            self.inner.update(id, changes).await
        }
        async fn count_active(&self, user_id: &UserId) -> StoreResult<usize> {
            self.inner.count_active(user_id).await
        }
        async fn insert(&self, watch: Watch) -> StoreResult<WatchId> {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            self.inner.insert(watch).await
        }
        async fn delete(&self, id: &WatchId) -> StoreResult<bool> {
            self.inner.delete(id).await
        }
        async fn list_for_user(&self, user_id: &UserId) -> StoreResult<Vec<Watch>> {
            self.inner.list_for_user(user_id).await
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 10, 30, 0).unwrap()
    }

    fn new_watch() -> NewWatch {
        NewWatch {
            property_id: "222".to_string(),
            property_name: "Loft with City Views".to_string(),
            property_url: "https://www.airbnb.com/rooms/222".to_string(),
            location: "Austin, TX".to_string(),
            image_url: None,
            check_in_date: NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
            check_out_date: NaiveDate::from_ymd_opt(2024, 6, 18).unwrap(),
            guests: 2,
            price: "$180".to_string(),
            frequency: Frequency::Hourly,
            partial_match: false,
        }
    }

    fn service() -> (Arc<LocalStore>, WatchService) {
        let store = Arc::new(LocalStore::in_memory());
        let service = WatchService::new(store.clone(), ScanCadence::default(), 5);
        (store, service)
    }

    #[tokio::test]
    async fn create_schedules_and_sets_expiry() {
        let (store, service) = service();
        let user = UserId::from("u1");

        let watch = service.create(&user, new_watch(), now()).await.unwrap();

        assert_eq!(watch.status, WatchStatus::Active);
        assert_eq!(
            watch.next_scan_at,
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 11, 0, 0).unwrap())
        );
        assert!(watch.next_scan_at.unwrap() >= now());
        assert_eq!(
            watch.expires_at,
            Utc.with_ymd_and_hms(2024, 6, 15, 23, 59, 59).unwrap()
        );
        assert_eq!(store.get(&watch.id).await.unwrap(), Some(watch));
    }

    #[tokio::test]
    async fn sixth_active_watch_is_rejected_before_insert() {
        let repo = Arc::new(CountingRepo {
            inner: LocalStore::in_memory(),
            inserts: AtomicUsize::new(0),
        });
        let service = WatchService::new(repo.clone(), ScanCadence::default(), 5);
        let user = UserId::from("u1");

        for _ in 0..5 {
            service.create(&user, new_watch(), now()).await.unwrap();
        }
        let sixth = service.create(&user, new_watch(), now()).await;

        assert!(matches!(sixth, Err(WatchError::LimitReached { limit: 5 })));
        assert_eq!(repo.inserts.load(Ordering::SeqCst), 5);
        assert_eq!(repo.count_active(&user).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn paused_watches_free_a_slot() {
        let (_store, service) = service();
        let user = UserId::from("u1");
        let mut created = Vec::new();
        for _ in 0..5 {
            created.push(service.create(&user, new_watch(), now()).await.unwrap());
        }

        service
            .update(
                &user,
                &created[0].id,
                WatchPatch {
                    status: Some(WatchStatus::Paused),
                    ..Default::default()
                },
                now(),
            )
            .await
            .unwrap();

        assert!(service.create(&user, new_watch(), now()).await.is_ok());
    }

    #[tokio::test]
    async fn invalid_watches_are_rejected() {
        let (store, service) = service();
        let user = UserId::from("u1");

        let mut reversed = new_watch();
        reversed.check_out_date = reversed.check_in_date;
        let mut past = new_watch();
        past.check_in_date = NaiveDate::from_ymd_opt(2024, 5, 31).unwrap();
        let mut nobody = new_watch();
        nobody.guests = 0;
        let mut nowhere = new_watch();
        nowhere.location = "  ".to_string();

        for new in [reversed, past, nobody, nowhere] {
            assert!(matches!(
                service.create(&user, new, now()).await,
                Err(WatchError::Invalid(_))
            ));
        }
        assert_eq!(store.count_active(&user).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn frequency_change_reschedules() {
        let (_store, service) = service();
        let user = UserId::from("u1");
        let watch = service.create(&user, new_watch(), now()).await.unwrap();

        let updated = service
            .update(
                &user,
                &watch.id,
                WatchPatch {
                    frequency: Some(Frequency::Sniper),
                    ..Default::default()
                },
                now(),
            )
            .await
            .unwrap();

        assert_eq!(updated.frequency, Frequency::Sniper);
        assert_eq!(updated.next_scan_at, Some(now() + Duration::minutes(5)));
    }

    #[tokio::test]
    async fn resuming_an_expired_watch_restores_schedule() {
        let (store, service) = service();
        let user = UserId::from("u1");
        let watch = service.create(&user, new_watch(), now()).await.unwrap();
        store
            .update(&watch.id, WatchChanges::expire(now()))
            .await
            .unwrap();

        let later = now() + Duration::hours(3);
        let resumed = service
            .update(
                &user,
                &watch.id,
                WatchPatch {
                    status: Some(WatchStatus::Active),
                    ..Default::default()
                },
                later,
            )
            .await
            .unwrap();

        assert_eq!(resumed.status, WatchStatus::Active);
        assert_eq!(
            resumed.next_scan_at,
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 14, 0, 0).unwrap())
        );
        assert_eq!(store.get(&watch.id).await.unwrap(), Some(resumed));
    }

    #[tokio::test]
    async fn error_status_cannot_be_requested() {
        let (_store, service) = service();
        let user = UserId::from("u1");
        let watch = service.create(&user, new_watch(), now()).await.unwrap();
        let result = service
            .update(
                &user,
                &watch.id,
                WatchPatch {
                    status: Some(WatchStatus::Error),
                    ..Default::default()
                },
                now(),
            )
            .await;
        assert!(matches!(result, Err(WatchError::Invalid(_))));
    }

    #[tokio::test]
    async fn only_owner_can_touch_a_watch() {
        let (store, service) = service();
        let owner = UserId::from("u1");
        let stranger = UserId::from("u2");
        let watch = service.create(&owner, new_watch(), now()).await.unwrap();

        assert!(matches!(
            service.delete(&stranger, &watch.id).await,
            Err(WatchError::NotOwner { .. })
        ));
        assert!(service.list(&stranger).await.unwrap().is_empty());

        service.delete(&owner, &watch.id).await.unwrap();
        assert!(store.get(&watch.id).await.unwrap().is_none());
        assert!(matches!(
            service.get(&owner, &watch.id).await,
            Err(WatchError::NotFound(_))
        ));
    }
}
