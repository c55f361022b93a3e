#![cfg(test)]

use crate::connection::key::ConnectionKey;
use crate::relevance::manager::RelevanceManager;
use crate::relevance::region::InterestRegion;
use crate::world::cell::Cell;

fn cell(x: i32, y: i32, z: i32) -> Cell {
    Cell::new(x, y, z)
}

#[test]
fn region_is_a_chebyshev_cube() {
    let region = InterestRegion::new(cell(0, 0, 0), 2);
    assert_eq!(region.cells().len(), 5 * 5 * 5);
    assert!(region.contains(&cell(2, -2, 2)));
    assert!(!region.contains(&cell(3, 0, 0)));
}

#[test]
fn zero_radius_region_is_one_cell() {
    let region = InterestRegion::new(cell(4, 4, 4), 0);
    assert_eq!(region.cells().len(), 1);
    assert!(region.contains(&cell(4, 4, 4)));
}

#[test]
fn first_anchor_enters_every_cell() {
    let mut manager = RelevanceManager::new();
    let key = ConnectionKey::new(1);
    manager.add_connection(key);

    let transitions = manager.tick(&key, Some(cell(0, 0, 0)), 1);
    assert_eq!(transitions.entered.len(), 27);
    assert!(transitions.left.is_empty());
    assert!(manager.contains(&key, &cell(1, 1, 1)));
}

#[test]
fn unchanged_anchor_reports_no_transitions() {
    let mut manager = RelevanceManager::new();
    let key = ConnectionKey::new(1);
    manager.add_connection(key);

    manager.tick(&key, Some(cell(0, 0, 0)), 1);
    let transitions = manager.tick(&key, Some(cell(0, 0, 0)), 1);
    assert!(transitions.is_empty());
}

#[test]
fn moving_anchor_diffs_cell_sets() {
    let mut manager = RelevanceManager::new();
    let key = ConnectionKey::new(1);
    manager.add_connection(key);

    manager.tick(&key, Some(cell(0, 0, 0)), 1);
    let transitions = manager.tick(&key, Some(cell(1, 0, 0)), 1);

    // One x-slab enters, one leaves; nothing appears in both sets.
    assert_eq!(transitions.entered.len(), 9);
    assert_eq!(transitions.left.len(), 9);
    assert!(transitions.entered.is_disjoint(&transitions.left));
    assert!(transitions.entered.contains(&cell(2, 0, 0)));
    assert!(transitions.left.contains(&cell(-1, 0, 0)));

    assert!(manager.contains(&key, &cell(2, 0, 0)));
    assert!(!manager.contains(&key, &cell(-1, 0, 0)));
}

#[test]
fn losing_the_anchor_empties_the_region() {
    let mut manager = RelevanceManager::new();
    let key = ConnectionKey::new(1);
    manager.add_connection(key);

    manager.tick(&key, Some(cell(0, 0, 0)), 1);
    let transitions = manager.tick(&key, None, 1);
    assert!(transitions.entered.is_empty());
    assert_eq!(transitions.left.len(), 27);
    assert!(!manager.contains(&key, &cell(0, 0, 0)));

    // Still no transitions while the anchor stays gone.
    assert!(manager.tick(&key, None, 1).is_empty());
}

#[test]
fn removed_connection_has_no_region() {
    let mut manager = RelevanceManager::new();
    let key = ConnectionKey::new(1);
    manager.add_connection(key);
    manager.tick(&key, Some(cell(0, 0, 0)), 1);

    manager.remove_connection(&key);
    assert!(!manager.contains(&key, &cell(0, 0, 0)));
    assert!(manager.tick(&key, Some(cell(0, 0, 0)), 1).is_empty());
}
