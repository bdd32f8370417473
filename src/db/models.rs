//! Database record models.

/// Kind of a namespace node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    Room,
}

/// A namespace node: a directory or a room.
#[derive(Debug, Clone)]
pub struct NodeRecord {
    pub id: i64,
    pub name: String,
    pub kind: NodeKind,
    /// Owner token; the seeded root directory has none.
    pub owner_token: Option<String>,
    /// Owner display name, denormalised for reads. Empty when the owner has
    /// no profile.
    pub owner_display_name: String,
    /// Unix seconds.
    pub created_at: i64,
    /// Canonical absolute path, always consistent with the ancestor chain.
    pub path: String,
}

/// A stored message. Append-only.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    #[allow(dead_code)] // DB primary key - stored for completeness
    pub id: i64,
    #[allow(dead_code)] // DB field - queries filter by the room_id param directly
    pub room_id: i64,
    /// Sender identity snapshot at write time.
    pub display_name: String,
    pub content: String,
    /// Unix nanoseconds; ids break ties.
    pub created_at: i64,
}

/// A per-owner profile.
#[derive(Debug, Clone)]
pub struct ConfigRecord {
    #[allow(dead_code)] // DB primary key - callers already hold the token
    pub owner_token: String,
    pub display_name: String,
}
