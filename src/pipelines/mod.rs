pub mod genotyping;
