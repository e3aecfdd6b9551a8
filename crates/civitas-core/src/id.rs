use slotmap::new_key_type;

new_key_type! {
    /// Identifies a placed building in the city.
    pub struct BuildingId;

    /// Identifies a walker (cart pusher, supplier, market buyer).
    pub struct WalkerId;

    /// Identifies an outstanding reservation inside one [`GoodStore`].
    ///
    /// Keys are generational: an id that was applied or cancelled is never
    /// valid again, even if its slot is reused.
    ///
    /// [`GoodStore`]: crate::store::GoodStore
    pub struct ReservationId;
}
