pub mod gemini_repository;
