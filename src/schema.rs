table! {
    medallas (id) {
        id -> Int4,
        nombre -> Text,
        descripcion -> Text,
        dificultad -> Int4,
        requiere_amistades -> Bool,
        requiere_puntos -> Bool,
        requiere_acciones -> Bool,
        requiere_torneos -> Bool,
        requiere_victoria_torneos -> Bool,
        numero_requerido -> Int4,
    }
}

table! {
    medallas_ganadas (id) {
        id -> Int4,
        id_usuario -> Int4,
        id_medalla -> Int4,
        fecha_ganada -> Timestamptz,
    }
}

table! {
    torneo_estadisticas (id) {
        id -> Int4,
        id_torneo -> Int4,
        id_jugador -> Int4,
        equipo -> Bool,
        puntos -> Int4,
        habilitado -> Bool,
    }
}

table! {
    torneos (id) {
        id -> Int4,
        creator_id -> Int4,
        nombre -> Text,
        modalidad -> Text,
        ubicacion_a_latitud -> Float8,
        ubicacion_a_longitud -> Float8,
        nombre_ubicacion_a -> Text,
        ubicacion_b_latitud -> Nullable<Float8>,
        ubicacion_b_longitud -> Nullable<Float8>,
        nombre_ubicacion_b -> Nullable<Text>,
        fecha_inicio -> Timestamptz,
        fecha_fin -> Timestamptz,
        ubicacion_aproximada -> Bool,
        metros_aproximados -> Nullable<Int4>,
        code_id -> Text,
        finalizado -> Bool,
        ganador_versus -> Nullable<Bool>,
        ganador_individual -> Nullable<Int4>,
    }
}

table! {
    user_actions (id) {
        id -> Int4,
        user_id -> Int4,
        tipo_accion -> Text,
        foto -> Nullable<Text>,
        latitud -> Float8,
        longitud -> Float8,
        ciudad -> Nullable<Text>,
        lugar -> Nullable<Text>,
        en_colaboracion -> Bool,
        es_para_torneo -> Bool,
        id_torneo -> Nullable<Int4>,
        created_at -> Timestamptz,
        deleted_at -> Nullable<Timestamptz>,
    }
}

table! {
    user_friends (id) {
        id -> Int4,
        user_id -> Int4,
        friend_id -> Int4,
        pending_id -> Nullable<Int4>,
        deleted_at -> Nullable<Timestamptz>,
    }
}

table! {
    user_stats (id) {
        id -> Int4,
        user_id -> Int4,
        puntos -> Int4,
        acciones -> Int4,
        torneos_participados -> Int4,
        torneos_ganados -> Int4,
        cantidad_amigos -> Int4,
        es_dueno_torneo -> Bool,
        pending_medalla -> Int4,
        pending_amigo -> Int4,
        torneo_id -> Nullable<Int4>,
    }
}

table! {
    users (id) {
        id -> Int4,
        name -> Text,
        email -> Nullable<Text>,
        password_hash -> Nullable<Text>,
        friend_code -> Text,
    }
}

allow_tables_to_appear_in_same_query!(
    medallas,
    medallas_ganadas,
    torneo_estadisticas,
    torneos,
    user_actions,
    user_friends,
    user_stats,
    users,
);
