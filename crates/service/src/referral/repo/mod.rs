pub mod seaorm;

pub use seaorm::SeaOrmReferralRepository;
