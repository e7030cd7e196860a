use crate::db::DBWrapper;
use crate::diesel::prelude::*;
use crate::error::Error;
use crate::models::{AccionId, NewUserAction, TorneoId, UserAction, UserId};
use crate::schema::user_actions;
use chrono::Utc;

/// Point value of an eco-action by category. The same table serves
/// creation and retraction, so a round trip is always neutral.
pub fn puntos_por_accion(tipo_accion: &str) -> i32 {
    match tipo_accion {
        "ayuda" => 50,
        "alerta" => 40,
        "descubrimiento" => 25,
        _ => 5,
    }
}

/// Caller-supplied fields for recording an action
pub struct AccionInput {
    pub user_id: UserId,
    pub tipo_accion: String,
    pub foto: Option<String>,
    pub latitud: f64,
    pub longitud: f64,
    pub ciudad: Option<String>,
    pub lugar: Option<String>,
    pub en_colaboracion: bool,
    pub id_torneo: Option<TorneoId>,
}

impl DBWrapper {
    /// Record an eco-action: insert the row and apply its point delta to
    /// the user's global stats, plus to the tournament score when the
    /// action is tagged for one and the player's participation row is
    /// still enabled. After the commit the badge worker is asked to
    /// re-evaluate the user.
    pub fn crear_accion(&self, input: &AccionInput) -> Result<UserAction, Error> {
        let puntos = puntos_por_accion(&input.tipo_accion);
        let accion = self.transaction(|| {
            let accion = diesel::insert_into(user_actions::table)
                .values(&NewUserAction {
                    user_id: input.user_id,
                    tipo_accion: &*input.tipo_accion,
                    foto: input.foto.as_deref(),
                    latitud: input.latitud,
                    longitud: input.longitud,
                    ciudad: input.ciudad.as_deref(),
                    lugar: input.lugar.as_deref(),
                    en_colaboracion: input.en_colaboracion,
                    es_para_torneo: input.id_torneo.is_some(),
                    id_torneo: input.id_torneo,
                    created_at: Utc::now(),
                })
                .get_result::<UserAction>(&self.db)?;
            self.add_acciones(input.user_id, 1)?;
            self.add_puntos(input.user_id, puntos)?;
            if let Some(torneo) = input.id_torneo {
                self.add_torneo_puntos(input.user_id, torneo, puntos)?;
            }
            Ok(accion)
        })?;
        self.request_badge_recheck(input.user_id);
        Ok(accion)
    }

    /// Retract an action: soft-delete the row and apply the exact
    /// inverse of every increment made at creation. The tournament score
    /// is only reversed while the participation row is still enabled; a
    /// finalized tournament's outcome stays as recorded. A stat just
    /// regressed, so the badge worker re-checks for stale awards.
    pub fn borrar_accion(&self, id: AccionId) -> Result<(), Error> {
        let user_id = self.transaction(|| {
            let accion = self.find_accion(id)?;
            let puntos = puntos_por_accion(&accion.tipo_accion);
            use user_actions::dsl;
            diesel::update(dsl::user_actions.find(accion.id))
                .set(dsl::deleted_at.eq(Utc::now()))
                .execute(&self.db)?;
            self.add_acciones(accion.user_id, -1)?;
            self.add_puntos(accion.user_id, -puntos)?;
            if let Some(torneo) = accion.id_torneo {
                self.add_torneo_puntos(accion.user_id, torneo, -puntos)?;
            }
            Ok(accion.user_id)
        })?;
        self.request_badge_recheck(user_id);
        Ok(())
    }

    /// Load a live (non-deleted) action
    pub fn find_accion(&self, id: AccionId) -> Result<UserAction, Error> {
        use user_actions::dsl;
        match dsl::user_actions
            .filter(dsl::id.eq(id).and(dsl::deleted_at.is_null()))
            .first::<UserAction>(&self.db)
            .optional()?
        {
            Some(accion) => Ok(accion),
            None => Err(Error::NoSuchAccion),
        }
    }

    /// A user's live actions, newest first
    pub fn acciones_de_usuario(&self, user_id: UserId) -> Result<Vec<UserAction>, Error> {
        use user_actions::dsl;
        Ok(dsl::user_actions
            .filter(dsl::user_id.eq(user_id).and(dsl::deleted_at.is_null()))
            .order(dsl::created_at.desc())
            .load::<UserAction>(&self.db)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tabla_de_puntos() {
        assert_eq!(puntos_por_accion("ayuda"), 50);
        assert_eq!(puntos_por_accion("alerta"), 40);
        assert_eq!(puntos_por_accion("descubrimiento"), 25);
        assert_eq!(puntos_por_accion("reciclaje"), 5);
        assert_eq!(puntos_por_accion(""), 5);
    }
}
