//! Guards that tie monitoring to a lexical scope.

use super::client::{SubscriptionClient, SubscriptionHandle};
use std::ops::Deref;

/// Monitors a handle until dropped. Created by [`monitoring`].
#[must_use = "monitoring stops as soon as the guard is dropped"]
pub struct Monitoring<'a, H: SubscriptionHandle + ?Sized> {
    handle: &'a H,
}

/// Start monitoring `handle`; stop again when the guard goes out of scope,
/// including during unwinding.
///
/// Works with raw subscription handles and with streams. Not reentrant: do
/// not nest guards for the same handle.
///
/// ```ignore
/// let stream = subscribe_param(&client, "dev/prop#field", StreamConfig::default())?;
/// {
///     let active = monitoring(&stream);
///     let first = active.pop_or_wait(None)?;
/// }
/// assert!(!stream.is_monitoring());
/// ```
pub fn monitoring<H: SubscriptionHandle + ?Sized>(handle: &H) -> Monitoring<'_, H> {
    handle.start_monitoring();
    Monitoring { handle }
}

impl<H: SubscriptionHandle + ?Sized> Deref for Monitoring<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        self.handle
    }
}

impl<H: SubscriptionHandle + ?Sized> Drop for Monitoring<'_, H> {
    fn drop(&mut self) {
        self.handle.stop_monitoring();
    }
}

/// Keeps all of a client's subscriptions running until dropped. Created by
/// [`subscriptions`].
#[must_use = "subscriptions stop as soon as the guard is dropped"]
pub struct Subscriptions<'a, C: SubscriptionClient + ?Sized> {
    client: &'a C,
}

/// Start every subscription of `client`; stop them all when the guard goes
/// out of scope.
pub fn subscriptions<C: SubscriptionClient + ?Sized>(client: &C) -> Subscriptions<'_, C> {
    client.start_subscriptions();
    Subscriptions { client }
}

impl<C: SubscriptionClient + ?Sized> Deref for Subscriptions<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.client
    }
}

impl<C: SubscriptionClient + ?Sized> Drop for Subscriptions<'_, C> {
    fn drop(&mut self) {
        self.client.stop_subscriptions();
    }
}
