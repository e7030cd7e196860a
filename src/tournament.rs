use crate::code::CodeKind;
use crate::db::DBWrapper;
use crate::diesel::prelude::*;
use crate::error::Error;
use crate::models::{
    NewTorneo, NewTorneoEstadisticas, RankingEntry, Torneo, TorneoEstadisticas, TorneoId, UserId,
};
use crate::schema::{torneo_estadisticas, torneos, user_stats, users};
use chrono::{DateTime, Utc};
use itertools::Itertools;

/// Tournament mode, stored as text in the `torneos` table
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Modalidad {
    Individual,
    Versus,
}

impl Modalidad {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modalidad::Individual => "Individual",
            Modalidad::Versus => "Versus",
        }
    }

    pub fn from_str(s: &str) -> Option<Modalidad> {
        match s {
            "Individual" => Some(Modalidad::Individual),
            "Versus" => Some(Modalidad::Versus),
            _ => None,
        }
    }
}

impl Torneo {
    /// Parsed tournament mode; unrecognized text is treated as Individual
    pub fn modo(&self) -> Modalidad {
        Modalidad::from_str(&self.modalidad).unwrap_or(Modalidad::Individual)
    }
}

/// Caller-supplied fields for tournament creation (the join code and the
/// lifecycle fields are filled in by the engine)
pub struct TorneoInput {
    pub nombre: String,
    pub modalidad: Modalidad,
    pub ubicacion_a_latitud: f64,
    pub ubicacion_a_longitud: f64,
    pub nombre_ubicacion_a: String,
    pub ubicacion_b_latitud: Option<f64>,
    pub ubicacion_b_longitud: Option<f64>,
    pub nombre_ubicacion_b: Option<String>,
    pub fecha_inicio: DateTime<Utc>,
    pub fecha_fin: DateTime<Utc>,
    pub ubicacion_aproximada: bool,
    pub metros_aproximados: Option<i32>,
}

/// Team for a new Versus enrollment: whichever side currently has fewer
/// players, ties going to team A (true)
pub fn asignar_equipo(en_equipo_a: i64, en_equipo_b: i64) -> bool {
    en_equipo_a <= en_equipo_b
}

/// Versus winner over the enabled participation rows: the team with the
/// strictly higher point sum. Requires both teams to be populated; an
/// empty side or a tie yields no winner.
pub fn ganador_versus(stats: &[TorneoEstadisticas]) -> Option<bool> {
    let sums = stats
        .iter()
        .filter(|s| s.habilitado)
        .map(|s| (s.equipo, s.puntos))
        .into_group_map();
    let (a, b) = match (sums.get(&true), sums.get(&false)) {
        (Some(a), Some(b)) => (a.iter().sum::<i32>(), b.iter().sum::<i32>()),
        _ => return None,
    };
    if a > b {
        Some(true)
    } else if b > a {
        Some(false)
    } else {
        None
    }
}

/// Individual winner over the enabled participation rows: the single
/// player with the strictly highest score. A shared top score yields no
/// winner.
pub fn ganador_individual(stats: &[TorneoEstadisticas]) -> Option<UserId> {
    let mut top: Option<&TorneoEstadisticas> = None;
    let mut tied = false;
    for s in stats.iter().filter(|s| s.habilitado) {
        match top {
            Some(t) if s.puntos > t.puntos => {
                top = Some(s);
                tied = false;
            }
            Some(t) if s.puntos == t.puntos => tied = true,
            Some(_) => {}
            None => top = Some(s),
        }
    }
    match (top, tied) {
        (Some(t), false) => Some(t.id_jugador),
        _ => None,
    }
}

impl DBWrapper {
    // ----- Tournament lookups -----

    /// Load a tournament from the database
    pub fn find_torneo(&self, id: TorneoId) -> Result<Torneo, Error> {
        match torneos::dsl::torneos
            .find(id)
            .first::<Torneo>(&self.db)
            .optional()?
        {
            Some(t) => Ok(t),
            None => Err(Error::NoSuchTorneo),
        }
    }

    /// Load a tournament by its join code
    pub fn find_torneo_by_code(&self, code_id: &str) -> Result<Torneo, Error> {
        match torneos::dsl::torneos
            .filter(torneos::dsl::code_id.eq(code_id))
            .first::<Torneo>(&self.db)
            .optional()?
        {
            Some(t) => Ok(t),
            None => Err(Error::NoSuchTorneo),
        }
    }

    /// The creator's current non-finalized tournament, if any
    fn find_active_torneo_by_creator(&self, creator: UserId) -> Result<Option<Torneo>, Error> {
        use torneos::dsl;
        Ok(dsl::torneos
            .filter(dsl::creator_id.eq(creator).and(dsl::finalizado.eq(false)))
            .first::<Torneo>(&self.db)
            .optional()?)
    }

    pub fn list_torneos(&self, limit: i64, offset: i64) -> Result<Vec<Torneo>, Error> {
        use torneos::dsl;
        Ok(dsl::torneos
            .order(dsl::fecha_inicio.desc())
            .limit(limit)
            .offset(offset)
            .load::<Torneo>(&self.db)?)
    }

    /// All tournaments a user is related to: created plus enrolled in
    pub fn torneos_de_usuario(&self, user_id: UserId) -> Result<Vec<Torneo>, Error> {
        let created = torneos::dsl::torneos
            .filter(torneos::dsl::creator_id.eq(user_id))
            .load::<Torneo>(&self.db)?;
        let enrolled_ids = torneo_estadisticas::dsl::torneo_estadisticas
            .filter(torneo_estadisticas::dsl::id_jugador.eq(user_id))
            .select(torneo_estadisticas::dsl::id_torneo)
            .load::<TorneoId>(&self.db)?;
        let enrolled = torneos::dsl::torneos
            .filter(torneos::dsl::id.eq_any(enrolled_ids))
            .load::<Torneo>(&self.db)?;
        Ok(created
            .into_iter()
            .chain(enrolled.into_iter())
            .unique_by(|t| t.id)
            .collect())
    }

    /// Load all participation rows of a tournament
    pub fn find_torneo_estadisticas(
        &self,
        torneo: TorneoId,
    ) -> Result<Vec<TorneoEstadisticas>, Error> {
        use torneo_estadisticas::dsl;
        Ok(dsl::torneo_estadisticas
            .filter(dsl::id_torneo.eq(torneo))
            .order(dsl::id.asc())
            .load::<TorneoEstadisticas>(&self.db)?)
    }

    /// Load a single player's participation row
    fn find_torneo_estadistica(
        &self,
        torneo: TorneoId,
        user_id: UserId,
    ) -> Result<Option<TorneoEstadisticas>, Error> {
        use torneo_estadisticas::dsl;
        Ok(dsl::torneo_estadisticas
            .filter(dsl::id_torneo.eq(torneo).and(dsl::id_jugador.eq(user_id)))
            .first::<TorneoEstadisticas>(&self.db)
            .optional()?)
    }

    /// Which team a user plays on in a Versus tournament
    pub fn equipo_de_usuario(&self, torneo: TorneoId, user_id: UserId) -> Result<bool, Error> {
        match self.find_torneo_estadistica(torneo, user_id)? {
            Some(row) => Ok(row.equipo),
            None => Err(Error::NotEnrolled),
        }
    }

    // ----- Lifecycle -----

    /// Create a tournament for `creator`.
    ///
    /// A user may hold at most one active tournament, in any role. The
    /// three rejection reasons are distinct so the caller can render
    /// them: they already created one, they are enrolled in one, or
    /// their stats row still carries the ownership mark.
    pub fn create_torneo(&self, creator: UserId, input: &TorneoInput) -> Result<Torneo, Error> {
        self.transaction(|| {
            if self.find_active_torneo_by_creator(creator)?.is_some() {
                return Err(Error::AlreadyOwnsTorneo);
            }
            let enrolled = torneo_estadisticas::table
                .inner_join(
                    torneos::table
                        .on(torneos::dsl::id.eq(torneo_estadisticas::dsl::id_torneo)),
                )
                .filter(
                    torneo_estadisticas::dsl::id_jugador
                        .eq(creator)
                        .and(torneos::dsl::finalizado.eq(false)),
                )
                .select(torneo_estadisticas::dsl::id)
                .first::<i32>(&self.db)
                .optional()?;
            if enrolled.is_some() {
                return Err(Error::AlreadyInTorneo);
            }
            if self.find_user_stats(creator)?.es_dueno_torneo {
                return Err(Error::OwnershipFlagSet);
            }

            let code_id = self.new_code(CodeKind::Torneo)?;
            let torneo = diesel::insert_into(torneos::table)
                .values(&NewTorneo {
                    creator_id: creator,
                    nombre: &*input.nombre,
                    modalidad: input.modalidad.as_str(),
                    ubicacion_a_latitud: input.ubicacion_a_latitud,
                    ubicacion_a_longitud: input.ubicacion_a_longitud,
                    nombre_ubicacion_a: &*input.nombre_ubicacion_a,
                    ubicacion_b_latitud: input.ubicacion_b_latitud,
                    ubicacion_b_longitud: input.ubicacion_b_longitud,
                    nombre_ubicacion_b: input.nombre_ubicacion_b.as_deref(),
                    fecha_inicio: input.fecha_inicio,
                    fecha_fin: input.fecha_fin,
                    ubicacion_aproximada: input.ubicacion_aproximada,
                    metros_aproximados: input.metros_aproximados,
                    code_id: &*code_id,
                    finalizado: false,
                    ganador_versus: None,
                    ganador_individual: None,
                })
                .get_result::<Torneo>(&self.db)?;
            self.set_es_dueno_torneo(creator, true)?;
            self.set_torneo_id(creator, Some(torneo.id))?;
            Ok(torneo)
        })
    }

    /// Enroll a player by join code.
    ///
    /// In Versus mode the player goes to the smaller team unless they
    /// passed an explicit preference, which is honored without
    /// rebalancing. `torneos_participados` accrues here and only here.
    pub fn inscribir_usuario(
        &self,
        code_id: &str,
        user_id: UserId,
        equipo_preferido: Option<bool>,
    ) -> Result<TorneoEstadisticas, Error> {
        self.transaction(|| {
            let torneo = self.find_torneo_by_code(code_id)?;
            if torneo.finalizado {
                return Err(Error::TorneoFinalizado);
            }
            if self.find_torneo_estadistica(torneo.id, user_id)?.is_some() {
                return Err(Error::AlreadyEnrolled);
            }

            let equipo = match torneo.modo() {
                Modalidad::Versus => match equipo_preferido {
                    Some(equipo) => equipo,
                    None => {
                        use torneo_estadisticas::dsl;
                        let en_a: i64 = dsl::torneo_estadisticas
                            .filter(dsl::id_torneo.eq(torneo.id).and(dsl::equipo.eq(true)))
                            .count()
                            .get_result(&self.db)?;
                        let en_b: i64 = dsl::torneo_estadisticas
                            .filter(dsl::id_torneo.eq(torneo.id).and(dsl::equipo.eq(false)))
                            .count()
                            .get_result(&self.db)?;
                        asignar_equipo(en_a, en_b)
                    }
                },
                Modalidad::Individual => false,
            };

            let row = diesel::insert_into(torneo_estadisticas::table)
                .values(&NewTorneoEstadisticas {
                    id_torneo: torneo.id,
                    id_jugador: user_id,
                    equipo,
                    puntos: 0,
                    habilitado: true,
                })
                .get_result::<TorneoEstadisticas>(&self.db)?;
            self.add_torneo_participado(user_id)?;
            self.set_torneo_id(user_id, Some(torneo.id))?;
            Ok(row)
        })
    }

    /// Voluntary exit of a non-owner while the tournament is still open
    pub fn salir_torneo(&self, user_id: UserId, torneo: TorneoId) -> Result<(), Error> {
        self.transaction(|| {
            let torneo = self.find_torneo(torneo)?;
            if torneo.finalizado {
                return Err(Error::TorneoFinalizado);
            }
            let row = match self.find_torneo_estadistica(torneo.id, user_id)? {
                Some(row) => row,
                None => return Err(Error::NotEnrolled),
            };
            diesel::delete(
                torneo_estadisticas::dsl::torneo_estadisticas
                    .find(row.id),
            )
            .execute(&self.db)?;
            self.drop_torneo_participado(user_id)?;
            self.set_torneo_id(user_id, None)?;
            Ok(())
        })
    }

    /// Adjust a player's score inside a tournament. Only an enabled
    /// participation row is touched; once the tournament is finalized
    /// (or the player never enrolled) this is a no-op.
    pub fn add_torneo_puntos(
        &self,
        user_id: UserId,
        torneo: TorneoId,
        delta: i32,
    ) -> Result<(), Error> {
        use torneo_estadisticas::dsl;
        diesel::update(
            dsl::torneo_estadisticas.filter(
                dsl::id_torneo
                    .eq(torneo)
                    .and(dsl::id_jugador.eq(user_id))
                    .and(dsl::habilitado.eq(true)),
            ),
        )
        .set(dsl::puntos.eq(dsl::puntos + delta))
        .execute(&self.db)?;
        Ok(())
    }

    /// Finalize the creator's active tournament: compute the winner,
    /// credit `torneos_ganados`, freeze the participation rows, and
    /// release everyone's membership. Runs exactly once per tournament;
    /// a second call finds no active tournament.
    pub fn terminar_torneo(&self, creator: UserId) -> Result<Torneo, Error> {
        self.transaction(|| {
            let torneo = match self.find_active_torneo_by_creator(creator)? {
                Some(t) => t,
                None => return Err(Error::NoActiveTorneo),
            };
            let stats_rows = self.find_torneo_estadisticas(torneo.id)?;

            let (ganador_vs, ganador_ind) = match torneo.modo() {
                Modalidad::Versus => {
                    let ganador = ganador_versus(&stats_rows);
                    if let Some(equipo) = ganador {
                        for row in stats_rows.iter().filter(|r| r.habilitado) {
                            if row.equipo == equipo {
                                self.add_torneos_ganados(row.id_jugador, 1)?;
                            }
                        }
                    }
                    (ganador, None)
                }
                Modalidad::Individual => {
                    let ganador = ganador_individual(&stats_rows);
                    if let Some(jugador) = ganador {
                        self.add_torneos_ganados(jugador, 1)?;
                    }
                    (None, ganador)
                }
            };

            use torneos::dsl;
            diesel::update(dsl::torneos.find(torneo.id))
                .set((
                    dsl::finalizado.eq(true),
                    dsl::ganador_versus.eq(ganador_vs),
                    dsl::ganador_individual.eq(ganador_ind),
                ))
                .execute(&self.db)?;

            // freeze scoring and release memberships
            diesel::update(
                torneo_estadisticas::dsl::torneo_estadisticas
                    .filter(torneo_estadisticas::dsl::id_torneo.eq(torneo.id)),
            )
            .set(torneo_estadisticas::dsl::habilitado.eq(false))
            .execute(&self.db)?;
            for row in &stats_rows {
                self.set_torneo_id(row.id_jugador, None)?;
            }
            self.set_es_dueno_torneo(creator, false)?;
            self.set_torneo_id(creator, None)?;

            self.find_torneo(torneo.id)
        })
    }

    /// Delete the creator's active tournament. Only an empty tournament
    /// can go away; otherwise the conflict reports how many players are
    /// still enrolled.
    pub fn borrar_torneo(&self, creator: UserId) -> Result<(), Error> {
        self.transaction(|| {
            let torneo = match self.find_active_torneo_by_creator(creator)? {
                Some(t) => t,
                None => return Err(Error::NoActiveTorneo),
            };
            use torneo_estadisticas::dsl;
            let participantes: i64 = dsl::torneo_estadisticas
                .filter(dsl::id_torneo.eq(torneo.id))
                .count()
                .get_result(&self.db)?;
            if participantes > 0 {
                return Err(Error::HasParticipants(participantes));
            }
            diesel::delete(dsl::torneo_estadisticas.filter(dsl::id_torneo.eq(torneo.id)))
                .execute(&self.db)?;
            diesel::delete(torneos::dsl::torneos.find(torneo.id)).execute(&self.db)?;
            self.set_es_dueno_torneo(creator, false)?;
            self.set_torneo_id(creator, None)?;
            Ok(())
        })
    }

    /// Update only the end date of a tournament
    pub fn update_fecha_fin(&self, torneo: TorneoId, fecha: DateTime<Utc>) -> Result<(), Error> {
        self.transaction(|| {
            use torneos::dsl;
            let updated = diesel::update(dsl::torneos.find(torneo))
                .set(dsl::fecha_fin.eq(fecha))
                .execute(&self.db)?;
            if updated == 0 {
                return Err(Error::NoSuchTorneo);
            }
            Ok(())
        })
    }

    // ----- Expiry sweep -----

    /// Creators of every non-finalized tournament whose end date has passed
    pub fn find_expired_tournaments(&self) -> Result<Vec<UserId>, Error> {
        use torneos::dsl;
        Ok(dsl::torneos
            .filter(
                dsl::finalizado
                    .eq(false)
                    .and(dsl::fecha_fin.lt(Utc::now())),
            )
            .select(dsl::creator_id)
            .load::<UserId>(&self.db)?)
    }

    /// Finalize every expired tournament. Safe to run from overlapping
    /// sweeps: a tournament that another sweep already closed shows up
    /// as NoActiveTorneo and is skipped. Returns how many were closed.
    pub fn finalizar_torneos_vencidos(&self) -> Result<usize, Error> {
        let mut finalizados = 0;
        for creator in self.find_expired_tournaments()? {
            match self.terminar_torneo(creator) {
                Ok(_) => finalizados += 1,
                Err(Error::NoActiveTorneo) => {}
                Err(e) => log::error!(
                    "couldn't finalize expired tournament of creator {}: {}",
                    creator,
                    e
                ),
            }
        }
        Ok(finalizados)
    }

    // ----- Ranking -----

    /// Per-tournament ranking, ordered by the points earned in that tournament
    pub fn ranking_torneo(&self, torneo: TorneoId) -> Result<Vec<RankingEntry>, Error> {
        Ok(torneo_estadisticas::table
            .inner_join(
                users::table.on(users::dsl::id.eq(torneo_estadisticas::dsl::id_jugador)),
            )
            .inner_join(
                user_stats::table
                    .on(user_stats::dsl::user_id.eq(torneo_estadisticas::dsl::id_jugador)),
            )
            .filter(torneo_estadisticas::dsl::id_torneo.eq(torneo))
            .select((
                torneo_estadisticas::dsl::id_jugador,
                users::dsl::name,
                torneo_estadisticas::dsl::puntos,
                user_stats::dsl::acciones,
                user_stats::dsl::torneos_ganados,
                user_stats::dsl::cantidad_amigos,
            ))
            .order(torneo_estadisticas::dsl::puntos.desc())
            .load::<RankingEntry>(&self.db)?)
    }
}
