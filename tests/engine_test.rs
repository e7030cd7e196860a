#[macro_use]
extern crate diesel_migrations;

mod common;

use chrono::{Duration, Utc};
use common::PgTestContext;
use futures_channel::mpsc;
use verde_server::actions::AccionInput;
use verde_server::badges::BadgeRecheck;
use verde_server::db::{init_db_pool, DBWrapper, PgPool};
use verde_server::error::Error;
use verde_server::models::{NewMedalla, TorneoId, User, UserId};
use verde_server::tournament::{Modalidad, TorneoInput};

struct TestEnv {
    ctx: PgTestContext,
    pool: PgPool,
    recheck_tx: mpsc::UnboundedSender<BadgeRecheck>,
    // keep the receiver alive so recheck sends don't error out
    _recheck_rx: mpsc::UnboundedReceiver<BadgeRecheck>,
}

impl TestEnv {
    fn new(test_name: &str) -> Option<TestEnv> {
        let (ctx, db_url) = PgTestContext::new(test_name)?;
        let pool = init_db_pool(&db_url).expect("can't open test database pool");
        let (recheck_tx, recheck_rx) = mpsc::unbounded();
        Some(TestEnv {
            ctx,
            pool,
            recheck_tx,
            _recheck_rx: recheck_rx,
        })
    }

    fn db(&self) -> DBWrapper {
        DBWrapper::from_pg_pool(&self.pool, self.recheck_tx.clone())
            .expect("can't get test database connection")
    }

    fn user(&self, name: &str) -> User {
        self.db()
            .new_user(name, &format!("{}@example.com", name), "password")
            .expect("couldn't create test user")
    }

    fn finish(self) {
        let TestEnv { mut ctx, pool, .. } = self;
        drop(pool);
        ctx.remove();
    }
}

fn torneo_input(modalidad: Modalidad) -> TorneoInput {
    TorneoInput {
        nombre: "Limpieza del río".to_string(),
        modalidad,
        ubicacion_a_latitud: -33.45,
        ubicacion_a_longitud: -70.66,
        nombre_ubicacion_a: "Parque O'Higgins".to_string(),
        ubicacion_b_latitud: None,
        ubicacion_b_longitud: None,
        nombre_ubicacion_b: None,
        fecha_inicio: Utc::now(),
        fecha_fin: Utc::now() + Duration::days(7),
        ubicacion_aproximada: false,
        metros_aproximados: None,
    }
}

fn accion(user_id: UserId, tipo_accion: &str, id_torneo: Option<TorneoId>) -> AccionInput {
    AccionInput {
        user_id,
        tipo_accion: tipo_accion.to_string(),
        foto: None,
        latitud: -33.45,
        longitud: -70.66,
        ciudad: Some("Santiago".to_string()),
        lugar: None,
        en_colaboracion: false,
        id_torneo,
    }
}

#[test]
fn action_round_trip_is_neutral() {
    let env = match TestEnv::new("round_trip") {
        Some(env) => env,
        None => return,
    };
    let db = env.db();
    let user = env.user("ana");

    let creada = db.crear_accion(&accion(user.id, "ayuda", None)).unwrap();
    let stats = db.find_user_stats(user.id).unwrap();
    assert_eq!(stats.puntos, 50);
    assert_eq!(stats.acciones, 1);

    db.borrar_accion(creada.id).unwrap();
    let stats = db.find_user_stats(user.id).unwrap();
    assert_eq!(stats.puntos, 0);
    assert_eq!(stats.acciones, 0);

    // the soft-deleted action can't be retracted twice
    assert_eq!(db.borrar_accion(creada.id), Err(Error::NoSuchAccion));
    assert!(db.acciones_de_usuario(user.id).unwrap().is_empty());

    env.finish();
}

#[test]
fn versus_scenario_end_to_end() {
    let env = match TestEnv::new("versus_scenario") {
        Some(env) => env,
        None => return,
    };
    let db = env.db();
    let ana = env.user("ana");
    let beto = env.user("beto");
    let carla = env.user("carla");

    let torneo = db
        .create_torneo(ana.id, &torneo_input(Modalidad::Versus))
        .unwrap();
    let row_b = db
        .inscribir_usuario(&torneo.code_id, beto.id, None)
        .unwrap();
    let row_c = db
        .inscribir_usuario(&torneo.code_id, carla.id, None)
        .unwrap();
    // smaller-team rule: first player to team A, second to team B
    assert_eq!(row_b.equipo, true);
    assert_eq!(row_c.equipo, false);
    assert_eq!(db.find_user_stats(beto.id).unwrap().torneo_id, Some(torneo.id));
    assert_eq!(db.find_user_stats(beto.id).unwrap().torneos_participados, 1);

    db.crear_accion(&accion(beto.id, "ayuda", Some(torneo.id)))
        .unwrap();
    let rows = db.find_torneo_estadisticas(torneo.id).unwrap();
    assert_eq!(rows.iter().find(|r| r.id_jugador == beto.id).unwrap().puntos, 50);

    let cerrado = db.terminar_torneo(ana.id).unwrap();
    assert_eq!(cerrado.finalizado, true);
    assert_eq!(cerrado.ganador_versus, Some(true));
    assert_eq!(db.find_user_stats(beto.id).unwrap().torneos_ganados, 1);
    assert_eq!(db.find_user_stats(carla.id).unwrap().torneos_ganados, 0);

    // membership and ownership released, scoring frozen
    assert_eq!(db.find_user_stats(ana.id).unwrap().es_dueno_torneo, false);
    assert_eq!(db.find_user_stats(beto.id).unwrap().torneo_id, None);
    assert!(db
        .find_torneo_estadisticas(torneo.id)
        .unwrap()
        .iter()
        .all(|r| !r.habilitado));

    // finalizing again finds nothing active
    assert_eq!(db.terminar_torneo(ana.id), Err(Error::NoActiveTorneo));

    env.finish();
}

#[test]
fn versus_enrollment_stays_balanced() {
    let env = match TestEnv::new("balanced_enrollment") {
        Some(env) => env,
        None => return,
    };
    let db = env.db();
    let creator = env.user("creadora");
    let torneo = db
        .create_torneo(creator.id, &torneo_input(Modalidad::Versus))
        .unwrap();

    for i in 0..4 {
        let player = env.user(&format!("jugador{}", i));
        db.inscribir_usuario(&torneo.code_id, player.id, None)
            .unwrap();
        let rows = db.find_torneo_estadisticas(torneo.id).unwrap();
        let en_a = rows.iter().filter(|r| r.equipo).count() as i64;
        let en_b = rows.iter().filter(|r| !r.equipo).count() as i64;
        assert!((en_a - en_b).abs() <= 1, "teams out of balance: {} vs {}", en_a, en_b);
    }

    // an explicit preference is honored without rebalancing
    let quinto = env.user("quinto");
    let row = db
        .inscribir_usuario(&torneo.code_id, quinto.id, Some(true))
        .unwrap();
    assert_eq!(row.equipo, true);

    env.finish();
}

#[test]
fn enrollment_conflicts() {
    let env = match TestEnv::new("enroll_conflicts") {
        Some(env) => env,
        None => return,
    };
    let db = env.db();
    let ana = env.user("ana");
    let beto = env.user("beto");

    assert_eq!(
        db.inscribir_usuario("up-up-up-up-up", beto.id, None),
        Err(Error::NoSuchTorneo)
    );

    let torneo = db
        .create_torneo(ana.id, &torneo_input(Modalidad::Individual))
        .unwrap();
    db.inscribir_usuario(&torneo.code_id, beto.id, None).unwrap();
    assert_eq!(
        db.inscribir_usuario(&torneo.code_id, beto.id, None),
        Err(Error::AlreadyEnrolled)
    );

    db.terminar_torneo(ana.id).unwrap();
    let carla = env.user("carla");
    assert_eq!(
        db.inscribir_usuario(&torneo.code_id, carla.id, None),
        Err(Error::TorneoFinalizado)
    );

    env.finish();
}

#[test]
fn create_ownership_conflicts() {
    let env = match TestEnv::new("ownership_conflicts") {
        Some(env) => env,
        None => return,
    };
    let db = env.db();
    let ana = env.user("ana");
    let beto = env.user("beto");

    let torneo = db
        .create_torneo(ana.id, &torneo_input(Modalidad::Versus))
        .unwrap();
    assert!(matches!(
        db.create_torneo(ana.id, &torneo_input(Modalidad::Versus)),
        Err(Error::AlreadyOwnsTorneo)
    ));

    db.inscribir_usuario(&torneo.code_id, beto.id, None).unwrap();
    assert!(matches!(
        db.create_torneo(beto.id, &torneo_input(Modalidad::Individual)),
        Err(Error::AlreadyInTorneo)
    ));

    env.finish();
}

#[test]
fn delete_requires_zero_participants() {
    let env = match TestEnv::new("delete_tournament") {
        Some(env) => env,
        None => return,
    };
    let db = env.db();
    let ana = env.user("ana");
    let beto = env.user("beto");

    let torneo = db
        .create_torneo(ana.id, &torneo_input(Modalidad::Versus))
        .unwrap();
    db.inscribir_usuario(&torneo.code_id, beto.id, None).unwrap();

    assert_eq!(db.borrar_torneo(ana.id), Err(Error::HasParticipants(1)));

    db.salir_torneo(beto.id, torneo.id).unwrap();
    let stats = db.find_user_stats(beto.id).unwrap();
    assert_eq!(stats.torneos_participados, 0);
    assert_eq!(stats.torneo_id, None);
    assert_eq!(
        db.salir_torneo(beto.id, torneo.id),
        Err(Error::NotEnrolled)
    );

    db.borrar_torneo(ana.id).unwrap();
    assert_eq!(db.find_torneo(torneo.id), Err(Error::NoSuchTorneo));
    assert_eq!(db.find_user_stats(ana.id).unwrap().es_dueno_torneo, false);

    // with the flags cleared the creator can start over
    db.create_torneo(ana.id, &torneo_input(Modalidad::Individual))
        .unwrap();

    env.finish();
}

#[test]
fn expiry_sweep_is_idempotent() {
    let env = match TestEnv::new("expiry_sweep") {
        Some(env) => env,
        None => return,
    };
    let db = env.db();
    let ana = env.user("ana");

    let torneo = db
        .create_torneo(ana.id, &torneo_input(Modalidad::Individual))
        .unwrap();
    assert_eq!(db.find_expired_tournaments().unwrap().len(), 0);

    db.update_fecha_fin(torneo.id, Utc::now() - Duration::minutes(5))
        .unwrap();
    assert_eq!(db.find_expired_tournaments().unwrap(), vec![ana.id]);

    assert_eq!(db.finalizar_torneos_vencidos().unwrap(), 1);
    assert!(db.find_torneo(torneo.id).unwrap().finalizado);
    // a second sweep finds nothing left to do
    assert_eq!(db.finalizar_torneos_vencidos().unwrap(), 0);

    env.finish();
}

#[test]
fn badges_are_awarded_and_revoked() {
    let env = match TestEnv::new("badges") {
        Some(env) => env,
        None => return,
    };
    let db = env.db();
    let ana = env.user("ana");

    let por_puntos = db
        .crear_medalla(&NewMedalla {
            nombre: "Cincuenta puntos",
            descripcion: "Suma 50 puntos",
            dificultad: 1,
            requiere_amistades: false,
            requiere_puntos: true,
            requiere_acciones: false,
            requiere_torneos: false,
            requiere_victoria_torneos: false,
            numero_requerido: 50,
        })
        .unwrap();
    let por_acciones = db
        .crear_medalla(&NewMedalla {
            nombre: "Dos acciones",
            descripcion: "Registra 2 acciones",
            dificultad: 1,
            requiere_amistades: false,
            requiere_puntos: false,
            requiere_acciones: true,
            requiere_torneos: false,
            requiere_victoria_torneos: false,
            numero_requerido: 2,
        })
        .unwrap();

    let primera = db.crear_accion(&accion(ana.id, "ayuda", None)).unwrap();
    let nuevas = db.evaluar_medallas(ana.id).unwrap();
    assert_eq!(nuevas, vec![por_puntos.id]);
    assert_eq!(db.find_user_stats(ana.id).unwrap().pending_medalla, 1);
    // already-won badges are not re-awarded
    assert!(db.evaluar_medallas(ana.id).unwrap().is_empty());

    db.crear_accion(&accion(ana.id, "alerta", None)).unwrap();
    let nuevas = db.evaluar_medallas(ana.id).unwrap();
    assert_eq!(nuevas, vec![por_acciones.id]);
    assert_eq!(db.find_user_stats(ana.id).unwrap().pending_medalla, 2);

    // nothing regressed yet, so nothing to revoke
    assert!(db.revocar_medallas(ana.id).unwrap().is_empty());

    // retracting the 50-point action drops both stats below threshold
    db.borrar_accion(primera.id).unwrap();
    let mut revocadas = db.revocar_medallas(ana.id).unwrap();
    revocadas.sort();
    let mut esperadas = vec![por_puntos.id, por_acciones.id];
    esperadas.sort();
    assert_eq!(revocadas, esperadas);
    assert!(db.medallas_de_usuario(ana.id).unwrap().is_empty());

    env.finish();
}

#[test]
fn tournament_score_reversal_stops_at_finalize() {
    let env = match TestEnv::new("score_reversal") {
        Some(env) => env,
        None => return,
    };
    let db = env.db();
    let ana = env.user("ana");
    let beto = env.user("beto");

    let torneo = db
        .create_torneo(ana.id, &torneo_input(Modalidad::Individual))
        .unwrap();
    db.inscribir_usuario(&torneo.code_id, beto.id, None).unwrap();

    // while the tournament is open, a retraction reverses its score
    let descartada = db
        .crear_accion(&accion(beto.id, "descubrimiento", Some(torneo.id)))
        .unwrap();
    assert_eq!(db.find_torneo_estadisticas(torneo.id).unwrap()[0].puntos, 25);
    db.borrar_accion(descartada.id).unwrap();
    assert_eq!(db.find_torneo_estadisticas(torneo.id).unwrap()[0].puntos, 0);

    // after finalization the recorded outcome is immutable
    let contada = db
        .crear_accion(&accion(beto.id, "descubrimiento", Some(torneo.id)))
        .unwrap();
    let cerrado = db.terminar_torneo(ana.id).unwrap();
    assert_eq!(cerrado.ganador_individual, Some(beto.id));
    db.borrar_accion(contada.id).unwrap();
    assert_eq!(db.find_torneo_estadisticas(torneo.id).unwrap()[0].puntos, 25);
    // the global counters still reverse
    assert_eq!(db.find_user_stats(beto.id).unwrap().puntos, 0);

    env.finish();
}

#[test]
fn individual_tie_declares_no_winner() {
    let env = match TestEnv::new("individual_tie") {
        Some(env) => env,
        None => return,
    };
    let db = env.db();
    let ana = env.user("ana");
    let beto = env.user("beto");
    let carla = env.user("carla");

    let torneo = db
        .create_torneo(ana.id, &torneo_input(Modalidad::Individual))
        .unwrap();
    db.inscribir_usuario(&torneo.code_id, beto.id, None).unwrap();
    db.inscribir_usuario(&torneo.code_id, carla.id, None).unwrap();

    let cerrado = db.terminar_torneo(ana.id).unwrap();
    assert_eq!(cerrado.finalizado, true);
    assert_eq!(cerrado.ganador_individual, None);
    assert_eq!(db.find_user_stats(beto.id).unwrap().torneos_ganados, 0);
    assert_eq!(db.find_user_stats(carla.id).unwrap().torneos_ganados, 0);

    env.finish();
}

#[test]
fn friendship_flow() {
    let env = match TestEnv::new("friendship") {
        Some(env) => env,
        None => return,
    };
    let db = env.db();
    let ana = env.user("ana");
    let beto = env.user("beto");

    assert_eq!(
        db.enviar_solicitud(ana.id, &ana.friend_code),
        Err(Error::SelfFriendRequest)
    );
    assert_eq!(
        db.enviar_solicitud(ana.id, "not-a-real-code"),
        Err(Error::NoSuchUser)
    );

    db.enviar_solicitud(ana.id, &beto.friend_code).unwrap();
    assert_eq!(db.find_user_stats(beto.id).unwrap().pending_amigo, 1);
    assert_eq!(
        db.enviar_solicitud(ana.id, &beto.friend_code),
        Err(Error::FriendRequestExists)
    );
    // the duplicate check is symmetric
    assert_eq!(
        db.enviar_solicitud(beto.id, &ana.friend_code),
        Err(Error::FriendRequestExists)
    );

    db.aceptar_solicitud(beto.id, ana.id).unwrap();
    assert_eq!(db.find_user_stats(ana.id).unwrap().cantidad_amigos, 1);
    assert_eq!(db.find_user_stats(beto.id).unwrap().cantidad_amigos, 1);
    assert_eq!(db.find_user_stats(beto.id).unwrap().pending_amigo, 0);
    assert_eq!(
        db.aceptar_solicitud(beto.id, ana.id),
        Err(Error::FriendRequestNotFound)
    );
    assert_eq!(db.lista_amigos(ana.id).unwrap().len(), 1);

    // removing a confirmed friendship decrements both counters
    db.eliminar_amigo(ana.id, beto.id).unwrap();
    assert_eq!(db.find_user_stats(ana.id).unwrap().cantidad_amigos, 0);
    assert_eq!(db.find_user_stats(beto.id).unwrap().cantidad_amigos, 0);
    assert!(db.lista_amigos(ana.id).unwrap().is_empty());
    // removing again is a no-op
    db.eliminar_amigo(ana.id, beto.id).unwrap();

    // a new request revives the soft-deleted row
    db.enviar_solicitud(beto.id, &ana.friend_code).unwrap();
    assert_eq!(db.find_user_stats(ana.id).unwrap().pending_amigo, 1);
    // withdrawing the pending request restores the recipient's counter
    db.eliminar_amigo(beto.id, ana.id).unwrap();
    assert_eq!(db.find_user_stats(ana.id).unwrap().pending_amigo, 0);

    env.finish();
}
