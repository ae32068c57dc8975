//! Warehouse delivery board

use stationcam_core::{
    reference_deliveries, Priority, ServiceError, SubmissionService, TaskStatus,
    WarehouseDelivery,
};
use tracing::debug;

/// Task counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// All tasks
    pub total: usize,
    /// Delivered
    pub delivered: usize,
    /// On the way
    pub in_transit: usize,
    /// Waiting for a robot
    pub queued: usize,
    /// Being picked
    pub picking: usize,
    /// Given up
    pub failed: usize,
}

impl DeliveryStats {
    fn count(deliveries: &[WarehouseDelivery]) -> Self {
        deliveries
            .iter()
            .fold(Self::default(), |mut stats, delivery| {
                stats.total += 1;
                match delivery.status {
                    TaskStatus::Delivered => stats.delivered += 1,
                    TaskStatus::InTransit => stats.in_transit += 1,
                    TaskStatus::Queued => stats.queued += 1,
                    TaskStatus::Picking => stats.picking += 1,
                    TaskStatus::Failed => stats.failed += 1,
                }
                stats
            })
    }
}

/// Robot delivery tasks as shown on the station dashboard
#[derive(Debug, Clone, Default)]
pub struct DeliveryBoard {
    deliveries: Vec<WarehouseDelivery>,
}

impl DeliveryBoard {
    /// Board over `deliveries`
    pub fn new(deliveries: Vec<WarehouseDelivery>) -> Self {
        Self { deliveries }
    }

    /// Board with the four reference deliveries
    pub fn seeded() -> Self {
        Self::new(reference_deliveries())
    }

    /// Reload from the submission service; the board is unchanged on error
    pub async fn refresh(&mut self, service: &dyn SubmissionService) -> Result<DeliveryStats, ServiceError> {
        let deliveries = service.list_deliveries().await?;
        debug!("Delivery board refreshed with {} tasks", deliveries.len());
        self.deliveries = deliveries;
        Ok(self.stats())
    }

    /// All tasks
    pub fn deliveries(&self) -> &[WarehouseDelivery] {
        &self.deliveries
    }

    /// Tasks with `status`
    pub fn with_status(&self, status: TaskStatus) -> impl Iterator<Item = &WarehouseDelivery> {
        self.deliveries.iter().filter(move |d| d.status == status)
    }

    /// Open tasks, most urgent first
    pub fn open_by_priority(&self) -> Vec<&WarehouseDelivery> {
        let mut open: Vec<_> = self
            .deliveries
            .iter()
            .filter(|d| !matches!(d.status, TaskStatus::Delivered | TaskStatus::Failed))
            .collect();
        open.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        open
    }

    /// Whether any open task is urgent
    pub fn has_urgent(&self) -> bool {
        self.open_by_priority()
            .first()
            .map_or(false, |d| d.priority == Priority::Urgent)
    }

    /// Counts per status
    pub fn stats(&self) -> DeliveryStats {
        DeliveryStats::count(&self.deliveries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stationcam_core::{SimulatedBackend, SimulatedOperation};

    #[test]
    fn test_seeded_stats() {
        let board = DeliveryBoard::seeded();
        assert_eq!(
            board.stats(),
            DeliveryStats {
                total: 4,
                delivered: 1,
                in_transit: 1,
                queued: 1,
                picking: 1,
                failed: 0,
            }
        );
        assert_eq!(board.with_status(TaskStatus::Queued).count(), 1);
    }

    #[test]
    fn test_open_tasks_by_priority() {
        let board = DeliveryBoard::seeded();
        let open: Vec<_> = board.open_by_priority().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(open, vec!["WD-002", "WD-003", "WD-004"]);
        assert!(!board.has_urgent());
    }

    #[tokio::test]
    async fn test_refresh_picks_up_new_task() {
        let backend = SimulatedBackend::instant(5);
        let mut board = DeliveryBoard::default();
        assert_eq!(board.stats().total, 0);

        backend
            .create_delivery_task("PROD-ABC123", "A-12-3", "Packaging Station A")
            .await
            .unwrap();
        let stats = board.refresh(&backend).await.unwrap();
        assert_eq!(stats.total, 5);
        assert_eq!(stats.queued, 2);

        backend.fail_next(SimulatedOperation::ListDeliveries, "offline");
        assert!(board.refresh(&backend).await.is_err());
        assert_eq!(board.deliveries().len(), 5);
    }
}
