//! Canonical, order-independent edge set.
//!
//! # Responsibility
//! - Hold every connection exactly once, keyed by its canonical pair.
//! - Derive connections from marker adjacency lists (edits and legacy files).
//! - Load/save the explicit connections file.
//!
//! # Invariants
//! - No connection joins two circles or a token to itself.
//! - Iteration and saving follow canonical tuple order.

use crate::model::connection::Connection;
use crate::model::marker::{Marker, MarkerKind};
use crate::model::token::Token;
use crate::repo::codec::{
    parse_connection_line, read_lines, value_to_token, write_lines, LineDiagnostic,
};
use crate::store::marker_store::MarkerStore;
use std::collections::BTreeSet;
use std::io::{BufRead, Write};

/// Result of reading the connections file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedConnections {
    pub connections: ConnectionSet,
    /// `false` when no connections file existed, which selects legacy migration.
    pub found_file: bool,
    pub diagnostics: Vec<LineDiagnostic>,
}

/// Set of connections between marker tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionSet {
    connections: BTreeSet<Connection>,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads an explicit connections file; `None` means the file does not exist.
    pub fn load_from_file<R: BufRead>(
        source: &str,
        reader: Option<R>,
    ) -> std::io::Result<LoadedConnections> {
        let Some(reader) = reader else {
            return Ok(LoadedConnections::default());
        };

        let (pairs, diagnostics) = read_lines(source, reader, |line| {
            let (a, b) = parse_connection_line(line)?;
            Ok(Connection::new(value_to_token(&a)?, value_to_token(&b)?)?)
        })?;

        Ok(LoadedConnections {
            connections: pairs.into_iter().collect(),
            found_file: true,
            diagnostics,
        })
    }

    /// Synthesizes connections from every marker's adjacency lists.
    pub fn from_marker_adjacency(markers: &MarkerStore) -> Self {
        markers
            .iter()
            .flat_map(Self::connections_implied_by_marker)
            .collect()
    }

    /// Connections a marker's own adjacency lists ask for.
    ///
    /// Adjacent squares apply to both kinds; adjacent circles only to squares.
    /// Self references and invalid pairs are dropped.
    pub fn connections_implied_by_marker(marker: &Marker) -> BTreeSet<Connection> {
        let token = marker.token();
        let mut implied: BTreeSet<Connection> = marker
            .adjacent_squares
            .iter()
            .filter(|square| square.is_square())
            .filter_map(|square| Connection::new(token.clone(), square.clone()).ok())
            .collect();

        if marker.kind() == MarkerKind::Square {
            implied.extend(
                marker
                    .adjacent_circles
                    .iter()
                    .filter_map(|circle| Connection::new(token.clone(), Token::circle(*circle)).ok()),
            );
        }
        implied
    }

    /// Writes one two-element array per line in canonical order.
    pub fn save<W: Write>(&self, writer: W) -> std::io::Result<()> {
        write_lines(writer, self.connections.iter())
    }

    /// Returns `true` when `connection` was not present yet.
    pub fn insert(&mut self, connection: Connection) -> bool {
        self.connections.insert(connection)
    }

    pub fn add<I: IntoIterator<Item = Connection>>(&mut self, connections: I) {
        self.connections.extend(connections);
    }

    pub fn remove(&mut self, connection: &Connection) -> bool {
        self.connections.remove(connection)
    }

    /// Drops every connection touching `token`; returns how many were removed.
    pub fn remove_all_containing(&mut self, token: &Token) -> usize {
        let before = self.connections.len();
        self.connections.retain(|connection| !connection.contains(token));
        before - self.connections.len()
    }

    /// Adds the connections implied by a newly placed marker.
    pub fn add_marker(&mut self, marker: &Marker) {
        self.add(Self::connections_implied_by_marker(marker));
    }

    /// Replaces the old marker's connections with the updated marker's.
    pub fn replace_marker(&mut self, old: &Marker, updated: &Marker) {
        self.remove_all_containing(old.token());
        self.add_marker(updated);
    }

    pub fn contains(&self, connection: &Connection) -> bool {
        self.connections.contains(connection)
    }

    /// Tokens directly connected to `token`, sorted.
    pub fn neighbors(&self, token: &Token) -> BTreeSet<Token> {
        self.connections
            .iter()
            .filter_map(|connection| connection.other(token).cloned())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.iter()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Connections with an endpoint no marker in `markers` carries.
    pub fn dangling<'a>(&'a self, markers: &'a MarkerStore) -> impl Iterator<Item = &'a Connection> {
        self.connections.iter().filter(move |connection| {
            markers.find_by_token(connection.first()).is_none()
                || markers.find_by_token(connection.second()).is_none()
        })
    }
}

impl FromIterator<Connection> for ConnectionSet {
    fn from_iter<I: IntoIterator<Item = Connection>>(iter: I) -> Self {
        Self {
            connections: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ConnectionSet {
    type Item = &'a Connection;
    type IntoIter = std::collections::btree_set::Iter<'a, Connection>;

    fn into_iter(self) -> Self::IntoIter {
        self.connections.iter()
    }
}
