use crate::db::{DBWrapper, PgPool};
use crate::diesel::prelude::*;
use crate::error::Error;
use crate::models::{Medalla, MedallaGanada, MedallaId, NewMedalla, NewMedallaGanada, UserId, UserStats};
use crate::schema::{medallas, medallas_ganadas};
use chrono::Utc;
use futures_channel::mpsc;
use futures_util::StreamExt;
use std::collections::HashSet;

/// A message asking the badge worker to re-evaluate one user's badges
pub struct BadgeRecheck {
    pub user_id: UserId,
}

/// Whether a user's current stats satisfy a badge definition. Each
/// enabled requirement flag pairs with the single `numero_requerido`
/// threshold, and meeting any one of them is enough (OR semantics).
pub fn cumple_requisitos(m: &Medalla, stats: &UserStats) -> bool {
    if m.requiere_amistades && stats.cantidad_amigos >= m.numero_requerido {
        return true;
    }
    if m.requiere_puntos && stats.puntos >= m.numero_requerido {
        return true;
    }
    if m.requiere_acciones && stats.acciones >= m.numero_requerido {
        return true;
    }
    if m.requiere_torneos && stats.torneos_participados >= m.numero_requerido {
        return true;
    }
    if m.requiere_victoria_torneos && stats.torneos_ganados >= m.numero_requerido {
        return true;
    }
    false
}

impl DBWrapper {
    pub fn crear_medalla(&self, medalla: &NewMedalla) -> Result<Medalla, Error> {
        Ok(diesel::insert_into(medallas::table)
            .values(medalla)
            .get_result::<Medalla>(&self.db)?)
    }

    pub fn find_medallas(&self) -> Result<Vec<Medalla>, Error> {
        Ok(medallas::dsl::medallas.load::<Medalla>(&self.db)?)
    }

    /// A user's awards, newest first
    pub fn medallas_de_usuario(&self, user_id: UserId) -> Result<Vec<MedallaGanada>, Error> {
        use medallas_ganadas::dsl;
        Ok(dsl::medallas_ganadas
            .filter(dsl::id_usuario.eq(user_id))
            .order(dsl::fecha_ganada.desc())
            .load::<MedallaGanada>(&self.db)?)
    }

    /// Names of the badges a user has won, newest first
    pub fn slogans_medallas(&self, user_id: UserId) -> Result<Vec<String>, Error> {
        Ok(medallas_ganadas::table
            .inner_join(
                medallas::table.on(medallas::dsl::id.eq(medallas_ganadas::dsl::id_medalla)),
            )
            .filter(medallas_ganadas::dsl::id_usuario.eq(user_id))
            .order(medallas_ganadas::dsl::fecha_ganada.desc())
            .select(medallas::dsl::nombre)
            .load::<String>(&self.db)?)
    }

    /// Award pass: grant every badge the user newly qualifies for and
    /// bump the unread-badge counter by the number granted. One
    /// transaction; a failure anywhere awards nothing.
    pub fn evaluar_medallas(&self, user_id: UserId) -> Result<Vec<MedallaId>, Error> {
        self.transaction(|| {
            let definiciones = self.find_medallas()?;
            let ganadas: HashSet<MedallaId> = medallas_ganadas::dsl::medallas_ganadas
                .filter(medallas_ganadas::dsl::id_usuario.eq(user_id))
                .select(medallas_ganadas::dsl::id_medalla)
                .load::<MedallaId>(&self.db)?
                .into_iter()
                .collect();
            let stats = self.find_user_stats(user_id)?;

            let mut nuevas = Vec::new();
            for medalla in definiciones
                .iter()
                .filter(|m| !ganadas.contains(&m.id) && cumple_requisitos(m, &stats))
            {
                diesel::insert_into(medallas_ganadas::table)
                    .values(&NewMedallaGanada {
                        id_usuario: user_id,
                        id_medalla: medalla.id,
                        fecha_ganada: Utc::now(),
                    })
                    .execute(&self.db)?;
                nuevas.push(medalla.id);
            }
            if !nuevas.is_empty() {
                self.add_pending_medalla(user_id, nuevas.len() as i32)?;
            }
            Ok(nuevas)
        })
    }

    /// Revocation pass: take back points- and actions-based awards whose
    /// stat has since fallen below the threshold. Friendship and
    /// tournament awards are permanent. One transaction; a failure
    /// anywhere revokes nothing.
    pub fn revocar_medallas(&self, user_id: UserId) -> Result<Vec<MedallaId>, Error> {
        self.transaction(|| {
            let stats = self.find_user_stats(user_id)?;
            let en_riesgo = medallas_ganadas::table
                .inner_join(
                    medallas::table.on(medallas::dsl::id.eq(medallas_ganadas::dsl::id_medalla)),
                )
                .filter(
                    medallas_ganadas::dsl::id_usuario.eq(user_id).and(
                        medallas::dsl::requiere_puntos
                            .eq(true)
                            .or(medallas::dsl::requiere_acciones.eq(true)),
                    ),
                )
                .select((
                    medallas::dsl::id,
                    medallas::dsl::requiere_puntos,
                    medallas::dsl::requiere_acciones,
                    medallas::dsl::numero_requerido,
                ))
                .load::<(MedallaId, bool, bool, i32)>(&self.db)?;

            let mut revocadas = Vec::new();
            for (id_medalla, por_puntos, por_acciones, requerido) in en_riesgo {
                let caduca = (por_puntos && stats.puntos < requerido)
                    || (por_acciones && stats.acciones < requerido);
                if caduca {
                    use medallas_ganadas::dsl;
                    diesel::delete(dsl::medallas_ganadas.filter(
                        dsl::id_usuario.eq(user_id).and(dsl::id_medalla.eq(id_medalla)),
                    ))
                    .execute(&self.db)?;
                    revocadas.push(id_medalla);
                }
            }
            Ok(revocadas)
        })
    }
}

/// Drain badge-recheck requests on a single worker task, so recomputation
/// never blocks the triggering operation and concurrency stays bounded.
/// Failures are logged and swallowed; the next recheck for the same user
/// converges to the right award set anyway.
pub async fn badge_worker(
    pool: PgPool,
    badge_recheck_tx: mpsc::UnboundedSender<BadgeRecheck>,
    mut badge_recheck_rx: mpsc::UnboundedReceiver<BadgeRecheck>,
) {
    while let Some(recheck) = badge_recheck_rx.next().await {
        let db = match DBWrapper::from_pg_pool(&pool, badge_recheck_tx.clone()) {
            Ok(db) => db,
            Err(e) => {
                log::error!("badge worker couldn't open db connection: {}", e);
                continue;
            }
        };
        if let Err(e) = db.evaluar_medallas(recheck.user_id) {
            log::warn!("badge award pass failed for user {}: {}", recheck.user_id, e);
        }
        if let Err(e) = db.revocar_medallas(recheck.user_id) {
            log::warn!(
                "badge revocation pass failed for user {}: {}",
                recheck.user_id,
                e
            );
        }
    }
}
