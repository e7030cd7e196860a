use bcrypt;
use diesel;
use r2d2;

use std::fmt;

#[derive(Debug)]
pub enum Error {
    DBError(diesel::result::Error),
    R2D2Error(r2d2::Error),
    BCryptError(bcrypt::BcryptError),
    NoSuchUser,
    NoSuchTorneo,
    NoSuchAccion,
    IncorrectCredentials,
    EmailAlreadyTaken,
    // tournament lifecycle conflicts
    AlreadyOwnsTorneo,
    AlreadyInTorneo,
    OwnershipFlagSet,
    TorneoFinalizado,
    AlreadyEnrolled,
    NotEnrolled,
    NoActiveTorneo,
    HasParticipants(i64),
    // friendship conflicts
    SelfFriendRequest,
    FriendRequestExists,
    FriendRequestNotFound,
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        use Error::*;
        match (self, other) {
            (DBError(_), DBError(_)) => true,
            (R2D2Error(_), R2D2Error(_)) => true,
            (BCryptError(_), BCryptError(_)) => true,
            (NoSuchUser, NoSuchUser) => true,
            (NoSuchTorneo, NoSuchTorneo) => true,
            (NoSuchAccion, NoSuchAccion) => true,
            (IncorrectCredentials, IncorrectCredentials) => true,
            (EmailAlreadyTaken, EmailAlreadyTaken) => true,
            (AlreadyOwnsTorneo, AlreadyOwnsTorneo) => true,
            (AlreadyInTorneo, AlreadyInTorneo) => true,
            (OwnershipFlagSet, OwnershipFlagSet) => true,
            (TorneoFinalizado, TorneoFinalizado) => true,
            (AlreadyEnrolled, AlreadyEnrolled) => true,
            (NotEnrolled, NotEnrolled) => true,
            (NoActiveTorneo, NoActiveTorneo) => true,
            (HasParticipants(a), HasParticipants(b)) => a == b,
            (SelfFriendRequest, SelfFriendRequest) => true,
            (FriendRequestExists, FriendRequestExists) => true,
            (FriendRequestNotFound, FriendRequestNotFound) => true,
            _ => false,
        }
    }
}

impl Eq for Error {}

impl From<diesel::result::Error> for Error {
    fn from(e: diesel::result::Error) -> Error {
        Error::DBError(e)
    }
}

impl From<r2d2::Error> for Error {
    fn from(e: r2d2::Error) -> Error {
        Error::R2D2Error(e)
    }
}

impl From<bcrypt::BcryptError> for Error {
    fn from(e: bcrypt::BcryptError) -> Error {
        Error::BCryptError(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Error::*;
        match self {
            DBError(e) => write!(f, "database error: {}", *e),
            R2D2Error(_) => write!(
                f,
                "database pool error: could not establish database connection"
            ),
            BCryptError(e) => write!(f, "bcrypt error: {}", *e),
            NoSuchUser => write!(f, "no such user"),
            NoSuchTorneo => write!(f, "no such tournament"),
            NoSuchAccion => write!(f, "no such action (or it was already deleted)"),
            IncorrectCredentials => write!(f, "incorrect login credentials"),
            EmailAlreadyTaken => write!(f, "email is already taken"),
            AlreadyOwnsTorneo => write!(f, "you already have an active tournament of your own"),
            AlreadyInTorneo => write!(
                f,
                "you are enrolled in an active tournament and can't create one"
            ),
            OwnershipFlagSet => write!(
                f,
                "your stats still mark you as owner of an active tournament"
            ),
            TorneoFinalizado => write!(f, "that tournament has already finished"),
            AlreadyEnrolled => write!(f, "you are already enrolled in that tournament"),
            NotEnrolled => write!(f, "you aren't enrolled in that tournament"),
            NoActiveTorneo => write!(f, "no active tournament was found for this user"),
            HasParticipants(n) => write!(
                f,
                "the tournament still has {} enrolled participant(s) and can't be deleted",
                n
            ),
            SelfFriendRequest => write!(f, "you can't send a friend request to yourself"),
            FriendRequestExists => write!(f, "that friend request already exists"),
            FriendRequestNotFound => write!(f, "no pending friend request between those users"),
        }
    }
}
