//! Ready-made credential types for supported services.

pub mod ibmcloud;
