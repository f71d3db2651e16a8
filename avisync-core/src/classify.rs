use crate::models::QualityTier;
use time::{Duration, OffsetDateTime};

/// Seuils de qualité dérivés de l'âge du dernier heartbeat.
/// Constantes (pas dans SyncConfig) : les tests de bornes en dépendent.
pub const EXCELLENT_WITHIN: Duration = Duration::minutes(2);
pub const GOOD_WITHIN: Duration = Duration::minutes(5);
pub const FAIR_WITHIN: Duration = Duration::minutes(10);

/// Fonction pure : dérive le tier de qualité depuis l'âge du dernier heartbeat.
/// Ne déduit JAMAIS is_connected — ce signal appartient au provider, et une
/// unité peut être connectée avec un tier Poor si son heartbeat est vieux.
pub fn quality_tier(last_seen: Option<OffsetDateTime>, now: OffsetDateTime) -> QualityTier {
    let Some(seen) = last_seen else {
        return QualityTier::Poor;
    };
    let age = now - seen;
    if age < EXCELLENT_WITHIN {
        QualityTier::Excellent
    } else if age < GOOD_WITHIN {
        QualityTier::Good
    } else if age < FAIR_WITHIN {
        QualityTier::Fair
    } else {
        QualityTier::Poor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(now: OffsetDateTime, secs_ago: i64) -> Option<OffsetDateTime> {
        Some(now - Duration::seconds(secs_ago))
    }

    #[test]
    fn absent_heartbeat_is_poor() {
        let now = OffsetDateTime::now_utc();
        assert_eq!(quality_tier(None, now), QualityTier::Poor);
    }

    #[test]
    fn two_minute_boundary() {
        let now = OffsetDateTime::now_utc();
        assert_eq!(quality_tier(at(now, 119), now), QualityTier::Excellent);
        assert_eq!(quality_tier(at(now, 120), now), QualityTier::Good);
    }

    #[test]
    fn five_minute_boundary() {
        let now = OffsetDateTime::now_utc();
        assert_eq!(quality_tier(at(now, 299), now), QualityTier::Good);
        assert_eq!(quality_tier(at(now, 300), now), QualityTier::Fair);
    }

    #[test]
    fn ten_minute_boundary() {
        let now = OffsetDateTime::now_utc();
        assert_eq!(quality_tier(at(now, 599), now), QualityTier::Fair);
        assert_eq!(quality_tier(at(now, 600), now), QualityTier::Poor);
        assert_eq!(quality_tier(at(now, 3600), now), QualityTier::Poor);
    }

    #[test]
    fn future_heartbeat_counts_as_fresh() {
        // horloge du device en avance : âge négatif, toléré comme Excellent
        let now = OffsetDateTime::now_utc();
        assert_eq!(quality_tier(at(now, -30), now), QualityTier::Excellent);
    }
}
