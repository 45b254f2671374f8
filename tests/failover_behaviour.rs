//! Behavioural scenarios for region failover.

mod failover;
