//! Raw SQL for the incident store and the location-check audit log. The
//! schema stores centers as PostGIS points; distance predicates run on the
//! geography cast so ST_DWithin operates in meters.

/// Minimum separation between incident centers, in meters. The exclusion
/// guard in [`INSERT_INCIDENT`] and [`UPDATE_INCIDENT`] rejects any write
/// that would place a center within this distance of another incident,
/// active or not. Policy knob, not a physical requirement: today it acts as
/// a near-duplicate guard rather than true non-overlap enforcement.
pub const MIN_SEPARATION_METERS: f64 = 1.0;

/// Existence check and insert in one statement so two concurrent creators
/// cannot both pass the check. No row returned means the guard rejected it.
/// Binds: $1 longitude, $2 latitude, $3 radius, $4 min separation.
pub const INSERT_INCIDENT: &str = r#"
INSERT INTO incidents (location, radius_meters, is_active)
SELECT ST_SetSRID(ST_MakePoint($1, $2), 4326), $3, TRUE
WHERE NOT EXISTS (
    SELECT 1 FROM incidents
    WHERE ST_DWithin(
        location::geography,
        ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography,
        $4
    )
)
RETURNING
    id,
    ST_Y(location::geometry) AS latitude,
    ST_X(location::geometry) AS longitude,
    radius_meters AS radius,
    is_active,
    created_at,
    updated_at;
"#;

/// Guarded relocate/resize; the excluded set ignores the incident itself.
/// Binds: $1 longitude, $2 latitude, $3 radius, $4 id, $5 min separation.
pub const UPDATE_INCIDENT: &str = r#"
UPDATE incidents
SET location = ST_SetSRID(ST_MakePoint($1, $2), 4326),
    radius_meters = $3,
    updated_at = NOW()
WHERE id = $4
  AND NOT EXISTS (
    SELECT 1 FROM incidents
    WHERE id != $4
      AND ST_DWithin(
        location::geography,
        ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography,
        $5
      )
  )
RETURNING
    id,
    ST_Y(location::geometry) AS latitude,
    ST_X(location::geometry) AS longitude,
    radius_meters AS radius,
    is_active,
    created_at,
    updated_at;
"#;

pub const DEACTIVATE_INCIDENT: &str = r#"
UPDATE incidents
SET is_active = FALSE, updated_at = NOW()
WHERE id = $1 AND is_active = TRUE;
"#;

pub const INCIDENT_EXISTS: &str = r#"
SELECT EXISTS(SELECT 1 FROM incidents WHERE id = $1);
"#;

pub const GET_INCIDENT_BY_ID: &str = r#"
SELECT
    id,
    ST_Y(location::geometry) AS latitude,
    ST_X(location::geometry) AS longitude,
    radius_meters AS radius,
    is_active,
    created_at,
    updated_at
FROM incidents
WHERE id = $1;
"#;

pub const LIST_INCIDENTS: &str = r#"
SELECT
    id,
    ST_Y(location::geometry) AS latitude,
    ST_X(location::geometry) AS longitude,
    radius_meters AS radius,
    is_active,
    created_at,
    updated_at
FROM incidents
ORDER BY created_at DESC, id DESC
LIMIT $1 OFFSET $2;
"#;

pub const GET_ACTIVE_INCIDENTS: &str = r#"
SELECT
    id,
    ST_Y(location::geometry) AS latitude,
    ST_X(location::geometry) AS longitude,
    radius_meters AS radius
FROM incidents
WHERE is_active = TRUE
ORDER BY id ASC;
"#;

/// Distinct users whose checks within the trailing window fall inside each
/// active incident's radius. $1 is the window in minutes.
pub const GET_INCIDENT_STATS: &str = r#"
SELECT
    i.id AS incident_id,
    COUNT(DISTINCT l.user_id) AS user_count,
    ST_Y(i.location::geometry) AS latitude,
    ST_X(i.location::geometry) AS longitude
FROM incidents i
LEFT JOIN location_checks l
    ON ST_DWithin(i.location::geography, l.location::geography, i.radius_meters)
   AND l.created_at >= NOW() - ($1 * INTERVAL '1 minute')
WHERE i.is_active = TRUE
GROUP BY i.id
ORDER BY i.id ASC;
"#;

pub const INSERT_LOCATION_CHECK: &str = r#"
INSERT INTO location_checks (user_id, location, has_danger, created_at)
VALUES ($1, ST_SetSRID(ST_MakePoint($2, $3), 4326), $4, NOW());
"#;
