use crate::db::DBWrapper;
use crate::diesel::prelude::*;
use crate::error::Error;
use crate::models::{NewUserFriend, UserFriend, UserId};
use crate::schema::user_friends;
use chrono::{DateTime, Utc};

/// Canonical storage order for a friendship pair: smaller id first, so a
/// pair maps to exactly one row no matter who initiated.
pub fn ordered_pair(a: UserId, b: UserId) -> (UserId, UserId) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

impl DBWrapper {
    /// The row for a pair, soft-deleted or not
    fn find_friend_row(&self, a: UserId, b: UserId) -> Result<Option<UserFriend>, Error> {
        use user_friends::dsl;
        let (lo, hi) = ordered_pair(a, b);
        Ok(dsl::user_friends
            .filter(dsl::user_id.eq(lo).and(dsl::friend_id.eq(hi)))
            .first::<UserFriend>(&self.db)
            .optional()?)
    }

    /// Send a friend request, addressing the recipient by friend code.
    ///
    /// Re-sending over a soft-deleted row revives it instead of
    /// inserting a second one. The recipient's pending counter goes up;
    /// it comes back down on accept or removal.
    pub fn enviar_solicitud(&self, user_id: UserId, friend_code: &str) -> Result<(), Error> {
        let recipient = self.find_user_by_friend_code(friend_code)?;
        if recipient.id == user_id {
            return Err(Error::SelfFriendRequest);
        }
        self.transaction(|| {
            let (lo, hi) = ordered_pair(user_id, recipient.id);
            match self.find_friend_row(lo, hi)? {
                Some(ref row) if row.deleted_at.is_none() => {
                    return Err(Error::FriendRequestExists)
                }
                Some(row) => {
                    use user_friends::dsl;
                    diesel::update(dsl::user_friends.find(row.id))
                        .set((
                            dsl::deleted_at.eq(None::<DateTime<Utc>>),
                            dsl::pending_id.eq(Some(recipient.id)),
                        ))
                        .execute(&self.db)?;
                }
                None => {
                    diesel::insert_into(user_friends::table)
                        .values(&NewUserFriend {
                            user_id: lo,
                            friend_id: hi,
                            pending_id: Some(recipient.id),
                        })
                        .execute(&self.db)?;
                }
            }
            self.add_pending_amigo(recipient.id, 1)?;
            Ok(())
        })
    }

    /// Accept a pending request between the two users. Only a live,
    /// still-pending row qualifies; both friend counters go up and the
    /// recipient's pending counter goes down.
    pub fn aceptar_solicitud(&self, user_id: UserId, friend_id: UserId) -> Result<(), Error> {
        self.transaction(|| {
            let row = match self.find_friend_row(user_id, friend_id)? {
                Some(row) if row.deleted_at.is_none() => row,
                _ => return Err(Error::FriendRequestNotFound),
            };
            let recipient = match row.pending_id {
                Some(p) if p == user_id || p == friend_id => p,
                _ => return Err(Error::FriendRequestNotFound),
            };
            use user_friends::dsl;
            diesel::update(dsl::user_friends.find(row.id))
                .set(dsl::pending_id.eq(None::<UserId>))
                .execute(&self.db)?;
            self.add_cantidad_amigos(user_id, 1)?;
            self.add_cantidad_amigos(friend_id, 1)?;
            self.add_pending_amigo(recipient, -1)?;
            Ok(())
        })
    }

    /// Remove a friendship (or withdraw/decline a pending request) by
    /// soft-deleting the row. The row's state is read before the delete:
    /// a confirmed friendship decrements both friend counters, a pending
    /// one decrements the recipient's pending counter. No live row is a
    /// no-op.
    pub fn eliminar_amigo(&self, user_id: UserId, friend_id: UserId) -> Result<(), Error> {
        self.transaction(|| {
            let row = match self.find_friend_row(user_id, friend_id)? {
                Some(row) if row.deleted_at.is_none() => row,
                _ => return Ok(()),
            };
            let pending = row.pending_id;
            use user_friends::dsl;
            diesel::update(dsl::user_friends.find(row.id))
                .set(dsl::deleted_at.eq(Utc::now()))
                .execute(&self.db)?;
            match pending {
                None => {
                    self.add_cantidad_amigos(user_id, -1)?;
                    self.add_cantidad_amigos(friend_id, -1)?;
                }
                Some(recipient) => {
                    self.add_pending_amigo(recipient, -1)?;
                }
            }
            Ok(())
        })
    }

    /// All live friendship rows involving the user (pending included)
    pub fn lista_amigos(&self, user_id: UserId) -> Result<Vec<UserFriend>, Error> {
        use user_friends::dsl;
        Ok(dsl::user_friends
            .filter(
                dsl::user_id
                    .eq(user_id)
                    .or(dsl::friend_id.eq(user_id))
                    .and(dsl::deleted_at.is_null()),
            )
            .order(dsl::id.asc())
            .load::<UserFriend>(&self.db)?)
    }
}
