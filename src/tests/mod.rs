#![cfg(test)]

mod policy;
mod relevance;
mod round_trip;
